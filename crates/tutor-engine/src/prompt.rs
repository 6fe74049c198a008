//! Generation prompt construction.
//!
//! The system prompt pins down the JSON contract of [`LearningModule`]; the
//! user prompt carries the subject, the module number, the adaptation
//! instructions derived from the previous module's result, and any source
//! material supplied by the learner.
//!
//! [`LearningModule`]: crate::LearningModule

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::normalizer::truncate_chars;
use crate::quiz::PerformanceLevel;

/// A prompt for one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationPrompt {
    /// Instructions describing the output contract.
    pub system: String,
    /// The concrete request.
    pub user: String,
}

/// How the previous module went, read back when building the next prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorPerformance {
    /// Classification of the previous quiz.
    pub level: PerformanceLevel,
    /// Score of the previous quiz.
    pub score: u8,
    /// Title of the previous module.
    pub previous_title: String,
    /// Questions the learner got wrong.
    pub missed_questions: Vec<String>,
}

/// Everything needed to ask for module `module_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest<'a> {
    /// Subject being studied.
    pub subject: &'a str,
    /// Number of the module to generate (1-indexed).
    pub module_number: u32,
    /// Result of the previous module; `None` for the first module.
    pub prior: Option<&'a PriorPerformance>,
    /// Optional learner-supplied text to ground the lesson in.
    pub source_material: Option<&'a str>,
    /// Number of quiz items to ask for.
    pub quiz_item_count: usize,
    /// Number of practice items to ask for.
    pub practice_item_count: usize,
    /// Maximum number of source material characters to include.
    pub max_source_chars: usize,
}

const SYSTEM_PROMPT: &str = r#"You are an adaptive tutor that writes one learning module at a time.
Respond with a single JSON object and nothing else: no prose, no markdown fences.
The object must have exactly these keys:
{
  "title": string,
  "objectives": [string, ...],
  "introduction": string,
  "explanation": string,
  "practiceItems": [{"question": string, "hint": string, "solution": string, "difficulty": "easy" | "medium" | "hard"}],
  "quizItems": [{"question": string, "kind": "multiple_choice" | "short_answer" | "applied", "options": [string, ...], "correctAnswer": string, "explanation": string}],
  "summaryPoints": [string, ...],
  "nextModulePreview": string
}
Only multiple_choice quiz items have "options", with at least two entries, and their "correctAnswer" must be the exact text of one option.
Short answer and applied items must have a short, unambiguous "correctAnswer" that can be checked by exact comparison."#;

/// Builds the prompt for one module.
///
/// # Examples
///
/// ```
/// use tutor_engine::prompt::{build_module_prompt, ModuleRequest};
///
/// let prompt = build_module_prompt(&ModuleRequest {
///     subject: "Algebra",
///     module_number: 1,
///     prior: None,
///     source_material: None,
///     quiz_item_count: 3,
///     practice_item_count: 2,
///     max_source_chars: 1000,
/// });
/// assert!(prompt.system.contains("quizItems"));
/// assert!(prompt.user.contains("module 1"));
/// assert!(prompt.user.contains("Algebra"));
/// ```
#[must_use]
pub fn build_module_prompt(request: &ModuleRequest<'_>) -> GenerationPrompt {
    let mut user = format!(
        "Write module {} of an adaptive course on \"{}\".\n",
        request.module_number, request.subject
    );
    let _ = writeln!(
        user,
        "Include {} practice items and exactly {} quiz items.",
        request.practice_item_count, request.quiz_item_count
    );

    user.push('\n');
    user.push_str(&adaptation_instructions(request.module_number, request.prior));

    if let Some(source) = request.source_material.map(str::trim).filter(|s| !s.is_empty()) {
        let excerpt = truncate_chars(source, request.max_source_chars);
        let _ = write!(
            user,
            "\n\nBase the lesson on the following source material:\n---\n{excerpt}\n---"
        );
    }

    GenerationPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Describes how the next module should differ from the previous one.
fn adaptation_instructions(module_number: u32, prior: Option<&PriorPerformance>) -> String {
    let Some(prior) = prior else {
        let text = if module_number <= 1 {
            "This is the first module. Assume no prior knowledge, start from the \
             fundamentals and pitch the difficulty at a balanced, introductory level."
        } else {
            "The learner did not complete the quiz of the previous module. Continue \
             with the next topic at a similar difficulty."
        };
        return text.to_string();
    };

    let mut text = format!(
        "The learner just finished \"{}\" and scored {}% ({} performance).\n",
        prior.previous_title, prior.score, prior.level
    );

    match prior.level {
        PerformanceLevel::Strong => text.push_str(
            "Increase the conceptual difficulty and introduce new sub-topics that build on \
             what was covered. Prefer hard practice items and applied quiz questions.",
        ),
        PerformanceLevel::Weak => text.push_str(
            "Re-teach the same core concepts before moving on. Use simpler language, \
             shorter steps and more worked examples. Prefer easy practice items.",
        ),
        PerformanceLevel::Partial => text.push_str(
            "Reinforce the aspects the learner struggled with while still advancing to \
             the next topic. Mix medium and easy practice items.",
        ),
    }

    if !prior.missed_questions.is_empty() && prior.level != PerformanceLevel::Strong {
        text.push_str("\nThe learner missed these questions:");
        for question in &prior.missed_questions {
            let _ = write!(text, "\n- {question}");
        }
    }

    text
}
