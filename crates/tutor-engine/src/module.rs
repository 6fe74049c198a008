//! Learning module types.
//!
//! A [`LearningModule`] is the unit of generated lesson content. Instances are
//! only ever produced by [`validate`](crate::validate), which guarantees the
//! structural invariants documented on each type; the session holds them by
//! value and never hands out mutable access.

use serde::{Deserialize, Serialize};

/// Expected answer that accepts any submission, including none at all.
///
/// Used by the placeholder quiz item of fallback modules so that a degraded
/// lesson never penalizes the learner.
pub const ACCEPT_ANY_ANSWER: &str = "[any answer]";

// ============================================================================
// Difficulty
// ============================================================================

/// Difficulty of a practice item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Warm-up exercise.
    Easy,
    /// Typical exercise (default for unknown values).
    #[default]
    Medium,
    /// Stretch exercise.
    Hard,
}

impl Difficulty {
    /// Parses a difficulty label, case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_engine::Difficulty;
    ///
    /// assert_eq!(Difficulty::from_str_case_insensitive("HARD"), Some(Difficulty::Hard));
    /// assert_eq!(Difficulty::from_str_case_insensitive("beginner"), Some(Difficulty::Easy));
    /// assert_eq!(Difficulty::from_str_case_insensitive("???"), None);
    /// ```
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "beginner" | "basic" | "simple" => Some(Self::Easy),
            "medium" | "intermediate" | "moderate" | "normal" => Some(Self::Medium),
            "hard" | "advanced" | "difficult" | "challenging" => Some(Self::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

// ============================================================================
// QuizKind
// ============================================================================

/// Kind of quiz question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    /// Pick one of at least two options.
    MultipleChoice,
    /// Free-text answer (default for unknown values).
    #[default]
    ShortAnswer,
    /// Free-text answer applying the concept to a scenario.
    Applied,
}

impl QuizKind {
    /// Parses a quiz kind label, case-insensitively.
    ///
    /// Separators (`-`, `_`, spaces) are ignored, so `"Multiple-Choice"`,
    /// `"multiple_choice"` and `"MultipleChoice"` are all accepted.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "multiplechoice" | "mcq" | "mc" | "choice" => Some(Self::MultipleChoice),
            "shortanswer" | "short" | "text" | "open" | "freetext" => Some(Self::ShortAnswer),
            "applied" | "application" | "scenario" | "practical" => Some(Self::Applied),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuizKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultipleChoice => write!(f, "multiple_choice"),
            Self::ShortAnswer => write!(f, "short_answer"),
            Self::Applied => write!(f, "applied"),
        }
    }
}

// ============================================================================
// PracticeItem and QuizItem
// ============================================================================

/// An ungraded practice exercise with a hint and worked solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeItem {
    /// The exercise prompt.
    pub question: String,
    /// A nudge shown on request.
    pub hint: String,
    /// The worked solution.
    pub solution: String,
    /// How hard the exercise is.
    pub difficulty: Difficulty,
}

/// A graded quiz question.
///
/// `options` is non-empty only when `kind` is [`QuizKind::MultipleChoice`],
/// in which case it holds at least two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizItem {
    /// The question text.
    pub question: String,
    /// The kind of question.
    pub kind: QuizKind,
    /// Answer options for multiple choice questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// The expected answer, compared after trimming and case folding.
    pub correct_answer: String,
    /// Why the expected answer is right; shown after grading.
    pub explanation: String,
}

impl QuizItem {
    /// Returns `true` if any submission counts as correct for this item.
    #[must_use]
    pub fn accepts_any_answer(&self) -> bool {
        self.correct_answer.trim() == ACCEPT_ANY_ANSWER
    }
}

// ============================================================================
// LearningModule
// ============================================================================

/// One generated unit of lesson content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningModule {
    /// Position of the module within the session (1-indexed).
    pub module_number: u32,
    /// Module title; never empty.
    pub title: String,
    /// Learning objectives in presentation order; never empty.
    pub objectives: Vec<String>,
    /// Text shown in the intro phase.
    pub introduction: String,
    /// Text shown in the explanation phase.
    pub explanation: String,
    /// Exercises shown in the practice phase.
    pub practice_items: Vec<PracticeItem>,
    /// Questions graded in the quiz phase.
    pub quiz_items: Vec<QuizItem>,
    /// Key takeaways shown in the summary phase.
    pub summary_points: Vec<String>,
    /// Teaser for what the next module covers.
    pub next_module_preview: String,
}

impl LearningModule {
    /// Returns `true` if the module has at least one quiz item to evaluate.
    #[must_use]
    pub fn has_quiz(&self) -> bool {
        !self.quiz_items.is_empty()
    }

    /// Returns the questions of the quiz items at the given indices.
    ///
    /// Indices that do not exist are skipped.
    #[must_use]
    pub fn quiz_questions(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&i| self.quiz_items.get(i))
            .map(|item| item.question.clone())
            .collect()
    }
}
