//! Error types for the tutor session engine.
//!
//! Only the generation client can fail for reasons outside the engine's
//! control. Everything else here is either a configuration problem caught at
//! startup or a usage error (an operation invoked in the wrong phase) that is
//! rejected without touching session state.

use std::path::PathBuf;

use crate::session::Phase;

/// A specialized `Result` type for tutor engine operations.
pub type Result<T> = std::result::Result<T, TutorError>;

/// Failure reported by a [`GenerationClient`](crate::GenerationClient).
///
/// `status` carries the HTTP status (or equivalent) when the service answered
/// with a non-success code, and is `None` for transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct GenerationFailure {
    /// Status code returned by the service, if any.
    pub status: Option<u16>,
    /// Human-readable description of the failure.
    pub message: String,
}

impl std::fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "generation service returned status {status}: {}",
                self.message
            ),
            None => write!(f, "generation request failed: {}", self.message),
        }
    }
}

impl GenerationFailure {
    /// Creates a failure for a transport error (no status received).
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a failure for a non-success status returned by the service.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Errors that can occur while running an adaptive learning session.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your tutor.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The generation client failed outright.
    #[error(transparent)]
    Generation(#[from] GenerationFailure),

    /// A module could not be produced because the generation client failed.
    ///
    /// The previous session state is left exactly as it was.
    #[error("Could not generate content for module {module_number}, please retry: {source}")]
    ModuleGenerationFailed {
        /// The module number that was being generated.
        module_number: u32,
        /// The underlying client failure.
        #[source]
        source: GenerationFailure,
    },

    /// A generation request is already outstanding for this session.
    #[error("A module is already being generated for this session")]
    GenerationInProgress,

    /// The session was restarted or closed while the module was generating.
    ///
    /// The generated content was discarded without touching the new session.
    #[error("Session was restarted or closed before module {module_number} arrived; result discarded")]
    SessionSuperseded {
        /// The module number whose result was discarded.
        module_number: u32,
    },

    // ========================================================================
    // Session Usage Errors
    // ========================================================================
    /// An operation was attempted in a phase that does not allow it.
    #[error("Invalid phase transition: cannot {action} during the {phase} phase")]
    InvalidPhaseTransition {
        /// The phase the session was in.
        phase: Phase,
        /// The rejected operation.
        action: String,
    },

    /// No module has been loaded into the session yet.
    #[error("No active module: start a session first")]
    NoActiveModule,

    /// The current module has no quiz items to evaluate.
    #[error("The current module has no quiz items to evaluate")]
    EmptyQuiz,

    /// An answer was submitted for a quiz item that does not exist.
    #[error("Quiz item {index} does not exist (module has {len} quiz items)")]
    QuizItemOutOfRange {
        /// The submitted index.
        index: usize,
        /// Number of quiz items in the current module.
        len: usize,
    },

    /// The quiz has already been scored; revisiting it is read-only.
    #[error("The quiz for this module has already been evaluated")]
    QuizAlreadyEvaluated,

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// A stored session state is inconsistent and was not restored.
    #[error("Invalid session state: {message}")]
    InvalidSessionState {
        /// Which consistency rule the state breaks.
        message: String,
    },

    /// Failed to append to the progress log.
    #[error("Failed to write progress log '{path}': {message}\n\nSuggestion: Check write permissions and available disk space")]
    ProgressLogError {
        /// Path of the progress log.
        path: PathBuf,
        /// Description of the write failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TutorError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `ModuleGenerationFailed` error.
    #[must_use]
    pub const fn module_generation_failed(module_number: u32, source: GenerationFailure) -> Self {
        Self::ModuleGenerationFailed {
            module_number,
            source,
        }
    }

    /// Creates a new `InvalidPhaseTransition` error.
    #[must_use]
    pub fn invalid_transition(phase: Phase, action: impl Into<String>) -> Self {
        Self::InvalidPhaseTransition {
            phase,
            action: action.into(),
        }
    }

    /// Creates a new `InvalidSessionState` error.
    #[must_use]
    pub fn invalid_session_state(message: impl Into<String>) -> Self {
        Self::InvalidSessionState {
            message: message.into(),
        }
    }

    /// Creates a new `ProgressLogError`.
    #[must_use]
    pub fn progress_log(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProgressLogError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if resubmitting the same request may succeed.
    ///
    /// Resubmission is safe: a failed or rejected generation request never
    /// mutates session state.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Generation(_) | Self::ModuleGenerationFailed { .. } | Self::GenerationInProgress
        )
    }

    /// Returns `true` if this error reflects a call made in the wrong session state.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPhaseTransition { .. }
                | Self::NoActiveModule
                | Self::EmptyQuiz
                | Self::QuizItemOutOfRange { .. }
                | Self::QuizAlreadyEvaluated
        )
    }
}
