//! Adaptive Tutor Session Engine
//!
//! Generates lesson modules, walks the learner through their phases, scores
//! quizzes, and adapts the next module to the result.

pub mod api;
pub mod config;
pub mod error;
pub mod generation;
pub mod module;
pub mod normalizer;
pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod quiz;
pub mod session;
pub mod validator;

#[cfg(test)]
mod testing;

pub use api::{create_router, AnswerRequest, AppState, ErrorResponse, JumpRequest, StartRequest};
pub use config::{Config, GeneratorConfig, SessionSettings, CONFIG_FILE_NAME};
pub use error::{GenerationFailure, Result, TutorError};
pub use generation::{ChatCompletionsClient, GenerationClient};
pub use module::{Difficulty, LearningModule, PracticeItem, QuizItem, QuizKind, ACCEPT_ANY_ANSWER};
pub use normalizer::{normalize, Normalized, NormalizedSource};
pub use orchestrator::{SessionOrchestrator, SessionView};
pub use progress::{JsonlProgressLog, ProgressRecord, ProgressSink};
pub use prompt::GenerationPrompt;
pub use quiz::{classify, grade, score, PerformanceLevel, PerformanceThresholds, QuizGrade};
pub use session::{Phase, PhaseContent, QuizOutcome, QuizPrompt, QuizReview, SessionState};
pub use validator::validate;
