//! Coercion of candidate objects into well-formed learning modules.
//!
//! [`validate`] is total: every missing or malformed field is replaced with
//! the least surprising substitute, so any JSON value yields a structurally
//! valid [`LearningModule`]. Applying it to its own serialized output is a
//! no-op.

use serde_json::{Map, Value};

use crate::module::{Difficulty, LearningModule, PracticeItem, QuizItem, QuizKind};

/// Objective injected when the candidate provides none.
pub const GENERIC_OBJECTIVE: &str = "Understand the core ideas of this module";

const TITLE_KEYS: &[&str] = &["title", "moduleTitle", "module_title"];
const OBJECTIVE_KEYS: &[&str] = &["objectives", "learningObjectives", "learning_objectives"];
const INTRODUCTION_KEYS: &[&str] = &["introduction", "intro"];
const EXPLANATION_KEYS: &[&str] = &["explanation", "content", "lesson"];
const PRACTICE_KEYS: &[&str] = &["practiceItems", "practice_items", "practice", "exercises"];
const QUIZ_KEYS: &[&str] = &["quizItems", "quiz_items", "quiz", "questions"];
const SUMMARY_KEYS: &[&str] = &["summaryPoints", "summary_points", "summary", "keyTakeaways"];
const PREVIEW_KEYS: &[&str] = &["nextModulePreview", "next_module_preview", "nextPreview"];

const QUESTION_KEYS: &[&str] = &["question", "prompt", "problem"];
const HINT_KEYS: &[&str] = &["hint"];
const SOLUTION_KEYS: &[&str] = &["solution", "answer", "workedSolution"];
const DIFFICULTY_KEYS: &[&str] = &["difficulty", "level"];
const KIND_KEYS: &[&str] = &["kind", "type", "questionType"];
const OPTION_KEYS: &[&str] = &["options", "choices"];
const ANSWER_KEYS: &[&str] = &["correctAnswer", "correct_answer", "answer"];
const QUIZ_EXPLANATION_KEYS: &[&str] = &["explanation", "rationale"];

/// Coerces a candidate object into a [`LearningModule`].
///
/// `module_number` is authoritative; any number inside the candidate is
/// ignored. A value of zero is raised to one.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tutor_engine::{validate, QuizKind};
///
/// let module = validate(
///     &json!({
///         "objectives": [],
///         "quizItems": [{"question": "2 + 2?", "kind": "multiple_choice",
///                        "options": ["4"], "correctAnswer": "4"}]
///     }),
///     2,
/// );
/// assert_eq!(module.title, "Module 2");
/// assert_eq!(module.objectives.len(), 1);
/// assert_eq!(module.quiz_items[0].kind, QuizKind::ShortAnswer);
/// assert!(module.quiz_items[0].options.is_empty());
/// ```
#[must_use]
pub fn validate(candidate: &Value, module_number: u32) -> LearningModule {
    let empty = Map::new();
    let object = candidate.as_object().unwrap_or(&empty);
    let module_number = module_number.max(1);

    let title = line(field(object, TITLE_KEYS));
    let title = if title.is_empty() {
        format!("Module {module_number}")
    } else {
        title
    };

    let mut objectives = string_list(field(object, OBJECTIVE_KEYS));
    if objectives.is_empty() {
        objectives.push(GENERIC_OBJECTIVE.to_string());
    }

    LearningModule {
        module_number,
        title,
        objectives,
        introduction: text(field(object, INTRODUCTION_KEYS)),
        explanation: text(field(object, EXPLANATION_KEYS)),
        practice_items: entries(field(object, PRACTICE_KEYS))
            .iter()
            .filter_map(practice_item)
            .collect(),
        quiz_items: entries(field(object, QUIZ_KEYS))
            .iter()
            .filter_map(quiz_item)
            .collect(),
        summary_points: string_list(field(object, SUMMARY_KEYS)),
        next_module_preview: text(field(object, PREVIEW_KEYS)),
    }
}

/// Coerces one practice entry; entries without a question are dropped.
fn practice_item(entry: &Value) -> Option<PracticeItem> {
    let item = match entry {
        Value::Object(object) => PracticeItem {
            question: line(field(object, QUESTION_KEYS)),
            hint: line(field(object, HINT_KEYS)),
            solution: line(field(object, SOLUTION_KEYS)),
            difficulty: field(object, DIFFICULTY_KEYS)
                .and_then(Value::as_str)
                .and_then(Difficulty::from_str_case_insensitive)
                .unwrap_or_default(),
        },
        Value::String(question) => PracticeItem {
            question: question.trim().to_string(),
            hint: String::new(),
            solution: String::new(),
            difficulty: Difficulty::default(),
        },
        _ => return None,
    };

    (!item.question.is_empty()).then_some(item)
}

/// Coerces one quiz entry; non-objects and entries without a question are dropped.
fn quiz_item(entry: &Value) -> Option<QuizItem> {
    let object = entry.as_object()?;

    let question = line(field(object, QUESTION_KEYS));
    if question.is_empty() {
        return None;
    }

    let options = string_list(field(object, OPTION_KEYS));
    let declared_kind = field(object, KIND_KEYS).and_then(Value::as_str);
    let mut kind = match declared_kind {
        Some(label) => QuizKind::from_str_case_insensitive(label).unwrap_or_default(),
        None if options.len() >= 2 => QuizKind::MultipleChoice,
        None => QuizKind::default(),
    };
    if kind == QuizKind::MultipleChoice && options.len() < 2 {
        kind = QuizKind::ShortAnswer;
    }

    let answer = field(object, ANSWER_KEYS);
    let correct_answer = if kind == QuizKind::MultipleChoice {
        option_by_index(answer, &options).unwrap_or_else(|| line(answer))
    } else {
        line(answer)
    };

    Some(QuizItem {
        question,
        kind,
        options: if kind == QuizKind::MultipleChoice {
            options
        } else {
            Vec::new()
        },
        correct_answer,
        explanation: line(field(object, QUIZ_EXPLANATION_KEYS)),
    })
}

/// Resolves an integer answer to the option at that index.
fn option_by_index(answer: Option<&Value>, options: &[String]) -> Option<String> {
    let index = usize::try_from(answer?.as_u64()?).ok()?;
    options.get(index).cloned()
}

/// Returns the first present, non-null value among `keys`.
fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// Returns the entries of a list value; anything else yields no entries.
fn entries(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// Renders a scalar or list of scalars as text, without trimming.
fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| text(Some(item)))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => String::new(),
    }
}

/// Renders a short field as trimmed text.
fn line(value: Option<&Value>) -> String {
    text(value).trim().to_string()
}

/// Coerces a list (or a lone scalar) into non-empty trimmed strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| line(Some(item)))
            .filter(|s| !s.is_empty())
            .collect(),
        Some(other) => {
            let single = line(Some(other));
            if single.is_empty() {
                Vec::new()
            } else {
                vec![single]
            }
        }
        None => Vec::new(),
    }
}
