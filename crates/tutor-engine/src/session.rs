//! Session state machine for one learner working through one module.
//!
//! The phase order is fixed: `Intro -> Explanation -> Practice -> Quiz ->
//! Summary`. [`SessionState::advance`] moves one step forward,
//! [`SessionState::jump_to`] revisits any phase of the current module, and
//! the quiz operations are only accepted while the learner is in the quiz
//! phase. Rejected operations never modify the state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::module::{LearningModule, PracticeItem, QuizItem, QuizKind};
use crate::quiz::{self, PerformanceLevel, PerformanceThresholds};

// ============================================================================
// Phase
// ============================================================================

/// Position of the learner within a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Title, objectives and introduction.
    #[default]
    Intro,
    /// The main explanation.
    Explanation,
    /// Ungraded practice exercises.
    Practice,
    /// Graded quiz.
    Quiz,
    /// Results and key takeaways.
    Summary,
}

impl Phase {
    /// All phases in presentation order.
    pub const ORDER: [Self; 5] = [
        Self::Intro,
        Self::Explanation,
        Self::Practice,
        Self::Quiz,
        Self::Summary,
    ];

    /// Returns the phase after this one, or `None` at `Summary`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_engine::Phase;
    ///
    /// assert_eq!(Phase::Intro.next(), Some(Phase::Explanation));
    /// assert_eq!(Phase::Quiz.next(), Some(Phase::Summary));
    /// assert_eq!(Phase::Summary.next(), None);
    /// ```
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Intro => Some(Self::Explanation),
            Self::Explanation => Some(Self::Practice),
            Self::Practice => Some(Self::Quiz),
            Self::Quiz => Some(Self::Summary),
            Self::Summary => None,
        }
    }

    /// Returns `true` for the last phase of a module.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Summary)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intro => write!(f, "intro"),
            Self::Explanation => write!(f, "explanation"),
            Self::Practice => write!(f, "practice"),
            Self::Quiz => write!(f, "quiz"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

// ============================================================================
// QuizOutcome
// ============================================================================

/// Result of evaluating the quiz of the current module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOutcome {
    /// Module the quiz belongs to.
    pub module_number: u32,
    /// Rounded percentage of correct answers.
    pub score: u8,
    /// Classification of the score.
    pub performance_level: PerformanceLevel,
    /// Correctness of each quiz item, in item order.
    pub correct: Vec<bool>,
}

// ============================================================================
// PhaseContent
// ============================================================================

/// A quiz question as shown to the learner before grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizPrompt {
    /// Index used when submitting an answer.
    pub index: usize,
    /// The question text.
    pub question: String,
    /// The kind of question.
    pub kind: QuizKind,
    /// Answer options for multiple choice questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// The answer submitted so far, if any.
    pub submitted: Option<String>,
}

/// A graded quiz question as shown in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizReview {
    /// The question text.
    pub question: String,
    /// What the learner submitted, if anything.
    pub submitted: Option<String>,
    /// The expected answer.
    pub correct_answer: String,
    /// Why the expected answer is right.
    pub explanation: String,
    /// Whether the submission was accepted.
    pub correct: bool,
}

/// The data visible to the learner in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseContent {
    /// Intro phase.
    #[serde(rename_all = "camelCase")]
    Intro {
        /// Module title.
        title: String,
        /// Learning objectives.
        objectives: Vec<String>,
        /// Introductory text.
        introduction: String,
    },
    /// Explanation phase.
    #[serde(rename_all = "camelCase")]
    Explanation {
        /// Module title.
        title: String,
        /// Explanation text.
        explanation: String,
    },
    /// Practice phase.
    #[serde(rename_all = "camelCase")]
    Practice {
        /// Practice exercises with hints and solutions.
        items: Vec<PracticeItem>,
    },
    /// Quiz phase; expected answers are withheld.
    #[serde(rename_all = "camelCase")]
    Quiz {
        /// Questions to answer, with any answers submitted so far.
        items: Vec<QuizPrompt>,
        /// Whether the quiz was already scored (answers are then read-only).
        evaluated: bool,
    },
    /// Summary phase.
    #[serde(rename_all = "camelCase")]
    Summary {
        /// Key takeaways.
        summary_points: Vec<String>,
        /// Teaser for the next module.
        next_module_preview: String,
        /// Quiz score, if the quiz was evaluated.
        score: Option<u8>,
        /// Performance level, if the quiz was evaluated.
        performance_level: Option<PerformanceLevel>,
        /// Graded questions, if the quiz was evaluated.
        review: Vec<QuizReview>,
    },
}

// ============================================================================
// SessionState
// ============================================================================

/// Mutable state of one adaptive learning session.
///
/// Created empty when a session starts, loaded with a module via
/// [`SessionState::start`], and replaced wholesale when the next module
/// arrives. Every field changes only through the transition methods;
/// deserialization rejects states those methods could not have produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredSessionState")]
pub struct SessionState {
    /// Current phase.
    phase: Phase,

    /// The module being studied.
    current_module: Option<LearningModule>,

    /// Submitted answers keyed by quiz item index.
    answers: BTreeMap<usize, String>,

    /// Score of the last evaluation.
    last_score: Option<u8>,

    /// Classification of the last evaluation.
    performance_level: Option<PerformanceLevel>,

    /// Quiz items missed in the last evaluation.
    missed_items: Vec<usize>,

    /// When this state was created.
    started_at: DateTime<Utc>,

    /// When this state last changed.
    updated_at: DateTime<Utc>,
}

/// Unchecked wire form of [`SessionState`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSessionState {
    phase: Phase,
    current_module: Option<LearningModule>,
    #[serde(default)]
    answers: BTreeMap<usize, String>,
    last_score: Option<u8>,
    performance_level: Option<PerformanceLevel>,
    #[serde(default)]
    missed_items: Vec<usize>,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoredSessionState> for SessionState {
    type Error = TutorError;

    fn try_from(stored: StoredSessionState) -> Result<Self> {
        if stored.last_score.is_some() != stored.performance_level.is_some() {
            return Err(TutorError::invalid_session_state(
                "lastScore and performanceLevel must be both set or both absent",
            ));
        }

        match &stored.current_module {
            None if stored.phase != Phase::Intro => {
                return Err(TutorError::invalid_session_state(format!(
                    "phase {} requires a loaded module",
                    stored.phase
                )));
            }
            None if stored.last_score.is_some() || !stored.answers.is_empty() => {
                return Err(TutorError::invalid_session_state(
                    "answers and scores require a loaded module",
                ));
            }
            Some(module) => {
                let len = module.quiz_items.len();
                if let Some(&index) = stored.answers.keys().find(|&&i| i >= len) {
                    return Err(TutorError::QuizItemOutOfRange { index, len });
                }
            }
            None => {}
        }

        Ok(Self {
            phase: stored.phase,
            current_module: stored.current_module,
            answers: stored.answers,
            last_score: stored.last_score,
            performance_level: stored.performance_level,
            missed_items: stored.missed_items,
            started_at: stored.started_at,
            updated_at: stored.updated_at,
        })
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Creates an empty state with no module loaded.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_engine::{Phase, SessionState};
    ///
    /// let state = SessionState::new();
    /// assert_eq!(state.phase(), Phase::Intro);
    /// assert!(state.current_module().is_none());
    /// assert!(state.last_score().is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            phase: Phase::Intro,
            current_module: None,
            answers: BTreeMap::new(),
            last_score: None,
            performance_level: None,
            missed_items: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Creates a state already started on `module`.
    #[must_use]
    pub fn with_module(module: LearningModule) -> Self {
        let mut state = Self::new();
        state.start(module);
        state
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The module being studied, if any.
    #[must_use]
    pub const fn current_module(&self) -> Option<&LearningModule> {
        self.current_module.as_ref()
    }

    /// Submitted answers keyed by quiz item index.
    #[must_use]
    pub const fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    /// Score of the last evaluation.
    #[must_use]
    pub const fn last_score(&self) -> Option<u8> {
        self.last_score
    }

    /// Classification of the last evaluation.
    #[must_use]
    pub const fn performance_level(&self) -> Option<PerformanceLevel> {
        self.performance_level
    }

    /// Indices of quiz items missed in the last evaluation.
    #[must_use]
    pub fn missed_items(&self) -> &[usize] {
        &self.missed_items
    }

    /// Returns `true` once the current module's quiz has been scored.
    #[must_use]
    pub const fn is_evaluated(&self) -> bool {
        self.last_score.is_some()
    }

    /// When this state was created.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When this state last changed.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Loads `module` and resets progress to the start of the intro phase.
    pub fn start(&mut self, module: LearningModule) {
        self.current_module = Some(module);
        self.phase = Phase::Intro;
        self.answers.clear();
        self.last_score = None;
        self.performance_level = None;
        self.missed_items.clear();
        self.touch();
    }

    /// Moves to the next phase; stays put at `Summary`.
    ///
    /// Returns the phase after the call.
    pub fn advance(&mut self) -> Result<Phase> {
        self.require_module()?;
        if let Some(next) = self.phase.next() {
            self.phase = next;
            self.touch();
        }
        Ok(self.phase)
    }

    /// Navigates to any phase of the current module without clearing data.
    pub fn jump_to(&mut self, phase: Phase) -> Result<()> {
        self.require_module()?;
        self.phase = phase;
        self.touch();
        Ok(())
    }

    /// Records `value` as the answer to quiz item `index`.
    ///
    /// Overwrites any earlier answer for the same item.
    pub fn submit_answer(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        let len = self.require_open_quiz("submit an answer")?.quiz_items.len();
        if index >= len {
            return Err(TutorError::QuizItemOutOfRange { index, len });
        }

        self.answers.insert(index, value.into());
        self.touch();
        Ok(())
    }

    /// Scores the quiz, records the result and moves to `Summary`.
    pub fn evaluate(&mut self, thresholds: &PerformanceThresholds) -> Result<QuizOutcome> {
        let module = self.require_open_quiz("evaluate the quiz")?;
        let grade = quiz::grade(&module.quiz_items, &self.answers).ok_or(TutorError::EmptyQuiz)?;
        let module_number = module.module_number;

        let level = thresholds.classify(grade.percentage);
        self.last_score = Some(grade.percentage);
        self.performance_level = Some(level);
        self.missed_items = grade.missed();
        self.phase = Phase::Summary;
        self.touch();

        Ok(QuizOutcome {
            module_number,
            score: grade.percentage,
            performance_level: level,
            correct: grade.correct,
        })
    }

    /// Returns what the learner can see in the current phase.
    pub fn visible_content(&self) -> Result<PhaseContent> {
        let module = self.require_module()?;

        let content = match self.phase {
            Phase::Intro => PhaseContent::Intro {
                title: module.title.clone(),
                objectives: module.objectives.clone(),
                introduction: module.introduction.clone(),
            },
            Phase::Explanation => PhaseContent::Explanation {
                title: module.title.clone(),
                explanation: module.explanation.clone(),
            },
            Phase::Practice => PhaseContent::Practice {
                items: module.practice_items.clone(),
            },
            Phase::Quiz => PhaseContent::Quiz {
                items: module
                    .quiz_items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| QuizPrompt {
                        index,
                        question: item.question.clone(),
                        kind: item.kind,
                        options: item.options.clone(),
                        submitted: self.answers.get(&index).cloned(),
                    })
                    .collect(),
                evaluated: self.is_evaluated(),
            },
            Phase::Summary => PhaseContent::Summary {
                summary_points: module.summary_points.clone(),
                next_module_preview: module.next_module_preview.clone(),
                score: self.last_score,
                performance_level: self.performance_level,
                review: if self.is_evaluated() {
                    self.review(&module.quiz_items)
                } else {
                    Vec::new()
                },
            },
        };

        Ok(content)
    }

    fn review(&self, items: &[QuizItem]) -> Vec<QuizReview> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let submitted = self.answers.get(&i).cloned();
                QuizReview {
                    question: item.question.clone(),
                    correct: quiz::answer_matches(item, submitted.as_deref()),
                    submitted,
                    correct_answer: item.correct_answer.clone(),
                    explanation: item.explanation.clone(),
                }
            })
            .collect()
    }

    fn require_module(&self) -> Result<&LearningModule> {
        self.current_module.as_ref().ok_or(TutorError::NoActiveModule)
    }

    /// Checks that quiz answers may still change: a module is loaded, the
    /// learner is in the quiz phase and the quiz has not been scored.
    fn require_open_quiz(&self, action: &str) -> Result<&LearningModule> {
        let module = self.require_module()?;
        if self.phase != Phase::Quiz {
            return Err(TutorError::invalid_transition(self.phase, action));
        }
        if self.is_evaluated() {
            return Err(TutorError::QuizAlreadyEvaluated);
        }
        Ok(module)
    }
}

// ============================================================================
// Tests
// ============================================================================
