//! Quiz scoring and performance classification.
//!
//! Answers are compared with trimmed, case-insensitive string equality. No
//! semantic matching is attempted: free-text answers are effectively
//! self-graded by the learner reading each item's explanation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::module::QuizItem;

// ============================================================================
// PerformanceLevel
// ============================================================================

/// Coarse classification of a quiz result, used to bias the next module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    /// The learner is ready for harder material.
    Strong,
    /// The learner grasped part of the material.
    Partial,
    /// The learner needs the core concepts re-taught.
    Weak,
}

impl std::fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strong => write!(f, "strong"),
            Self::Partial => write!(f, "partial"),
            Self::Weak => write!(f, "weak"),
        }
    }
}

/// Default minimum percentage for [`PerformanceLevel::Strong`].
pub const DEFAULT_STRONG_THRESHOLD: u8 = 80;

/// Default minimum percentage for [`PerformanceLevel::Partial`].
pub const DEFAULT_PARTIAL_THRESHOLD: u8 = 60;

const fn default_strong() -> u8 {
    DEFAULT_STRONG_THRESHOLD
}

const fn default_partial() -> u8 {
    DEFAULT_PARTIAL_THRESHOLD
}

/// Percentage cutoffs separating the three performance bands.
///
/// A score exactly at a cutoff resolves to the higher band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceThresholds {
    /// Scores at or above this are `strong`.
    #[serde(default = "default_strong")]
    pub strong: u8,
    /// Scores at or above this (and below `strong`) are `partial`.
    #[serde(default = "default_partial")]
    pub partial: u8,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            strong: default_strong(),
            partial: default_partial(),
        }
    }
}

impl PerformanceThresholds {
    /// Classifies a percentage with these cutoffs.
    #[must_use]
    pub const fn classify(&self, percentage: u8) -> PerformanceLevel {
        if percentage >= self.strong {
            PerformanceLevel::Strong
        } else if percentage >= self.partial {
            PerformanceLevel::Partial
        } else {
            PerformanceLevel::Weak
        }
    }
}

/// Classifies a percentage with the default 80/60 cutoffs.
///
/// # Examples
///
/// ```
/// use tutor_engine::{classify, PerformanceLevel};
///
/// assert_eq!(classify(80), PerformanceLevel::Strong);
/// assert_eq!(classify(79), PerformanceLevel::Partial);
/// assert_eq!(classify(60), PerformanceLevel::Partial);
/// assert_eq!(classify(59), PerformanceLevel::Weak);
/// ```
#[must_use]
pub const fn classify(percentage: u8) -> PerformanceLevel {
    PerformanceThresholds {
        strong: DEFAULT_STRONG_THRESHOLD,
        partial: DEFAULT_PARTIAL_THRESHOLD,
    }
    .classify(percentage)
}

// ============================================================================
// Grading
// ============================================================================

/// Per-item breakdown of a graded quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizGrade {
    /// Correctness of each quiz item, in item order.
    pub correct: Vec<bool>,
    /// Number of correct items.
    pub correct_count: usize,
    /// Rounded percentage of correct items (0 to 100).
    pub percentage: u8,
}

impl QuizGrade {
    /// Indices of the items answered incorrectly or left unanswered.
    #[must_use]
    pub fn missed(&self) -> Vec<usize> {
        self.correct
            .iter()
            .enumerate()
            .filter(|(_, ok)| !**ok)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Returns `true` if `given` matches `item`'s expected answer.
///
/// Items carrying the accept-any sentinel match every submission, including
/// a missing one.
#[must_use]
pub fn answer_matches(item: &QuizItem, given: Option<&str>) -> bool {
    if item.accepts_any_answer() {
        return true;
    }
    given.is_some_and(|answer| {
        answer.trim().to_lowercase() == item.correct_answer.trim().to_lowercase()
    })
}

/// Grades submitted answers against quiz items.
///
/// Returns `None` when there are no items, since the score is undefined.
#[must_use]
pub fn grade(items: &[QuizItem], answers: &BTreeMap<usize, String>) -> Option<QuizGrade> {
    if items.is_empty() {
        return None;
    }

    let correct: Vec<bool> = items
        .iter()
        .enumerate()
        .map(|(i, item)| answer_matches(item, answers.get(&i).map(String::as_str)))
        .collect();
    let correct_count = correct.iter().filter(|&&ok| ok).count();

    Some(QuizGrade {
        percentage: percentage(correct_count, items.len()),
        correct,
        correct_count,
    })
}

/// Scores submitted answers as a 0 to 100 percentage.
///
/// Returns `None` when there are no items.
#[must_use]
pub fn score(items: &[QuizItem], answers: &BTreeMap<usize, String>) -> Option<u8> {
    grade(items, answers).map(|g| g.percentage)
}

/// `round(100 * correct / total)` with halves rounded up.
fn percentage(correct: usize, total: usize) -> u8 {
    let rounded = (200 * correct + total) / (2 * total);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}
