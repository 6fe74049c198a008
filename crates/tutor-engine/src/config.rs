//! Configuration types for the tutor session engine.
//!
//! This module provides the configuration structures used to reach the
//! generation service, size generated modules, classify quiz results, and
//! record progress.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::quiz::PerformanceThresholds;

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "tutor.json";

/// Default generation API base URL.
fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Default model name.
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "TUTOR_API_KEY".to_string()
}

/// Default request timeout in seconds.
const fn default_timeout_secs() -> u64 {
    60
}

/// Default sampling temperature.
const fn default_temperature() -> f32 {
    0.7
}

/// Default number of quiz items per module.
const fn default_quiz_item_count() -> usize {
    5
}

/// Default number of practice items per module.
const fn default_practice_item_count() -> usize {
    3
}

/// Default maximum number of source material characters sent per prompt.
const fn default_max_source_chars() -> usize {
    12_000
}

/// Default progress log path.
#[allow(clippy::unnecessary_wraps)]
fn default_progress_log() -> Option<String> {
    Some(".tutor/progress.jsonl".to_string())
}

/// Main configuration for the tutor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Generation service settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Session and prompt settings.
    #[serde(default)]
    pub session: SessionSettings,

    /// Path of the JSON Lines progress log; `null` disables it.
    #[serde(default = "default_progress_log")]
    pub progress_log: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            session: SessionSettings::default(),
            progress_log: default_progress_log(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `tutor.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            TutorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `TutorError::ConfigValidationError` if the configuration values
    /// are invalid (e.g., zero quiz items, inverted thresholds).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(TutorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TutorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        self.generator.validate()?;
        self.session.validate()?;

        if self
            .progress_log
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(TutorError::config_validation(
                "progressLog must not be empty",
                "Provide a file path for progressLog in your tutor.json, or set it to null to disable it",
            ));
        }

        Ok(())
    }
}

/// Settings for the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// API base URL of an OpenAI-compatible chat completions service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model to request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(TutorError::config_validation(
                "generator.endpoint must not be empty",
                "Set generator.endpoint to your API base URL, e.g. https://api.openai.com/v1",
            ));
        }

        if self.model.trim().is_empty() {
            return Err(TutorError::config_validation(
                "generator.model must not be empty",
                "Set generator.model to a chat model name in your tutor.json",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(TutorError::config_validation(
                "generator.apiKeyEnv must not be empty",
                "Set generator.apiKeyEnv to the environment variable holding your API key",
            ));
        }

        if self.timeout_secs == 0 {
            return Err(TutorError::config_validation(
                "generator.timeoutSecs must be greater than 0",
                "Set generator.timeoutSecs to at least 1 second in your tutor.json",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TutorError::config_validation(
                format!(
                    "generator.temperature must be between 0.0 and 2.0, got {}",
                    self.temperature
                ),
                "Set generator.temperature to a value such as 0.7 in your tutor.json",
            ));
        }

        Ok(())
    }
}

/// Settings controlling generated module size and quiz classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Number of quiz items requested per module.
    #[serde(default = "default_quiz_item_count")]
    pub quiz_item_count: usize,

    /// Number of practice items requested per module.
    #[serde(default = "default_practice_item_count")]
    pub practice_item_count: usize,

    /// Maximum number of source material characters included in a prompt.
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,

    /// Cutoffs for performance classification.
    #[serde(default)]
    pub thresholds: PerformanceThresholds,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            quiz_item_count: default_quiz_item_count(),
            practice_item_count: default_practice_item_count(),
            max_source_chars: default_max_source_chars(),
            thresholds: PerformanceThresholds::default(),
        }
    }
}

impl SessionSettings {
    fn validate(&self) -> Result<()> {
        if !(1..=20).contains(&self.quiz_item_count) {
            return Err(TutorError::config_validation(
                format!(
                    "session.quizItemCount must be between 1 and 20, got {}",
                    self.quiz_item_count
                ),
                "Set session.quizItemCount to a value such as 5 in your tutor.json",
            ));
        }

        if self.practice_item_count > 20 {
            return Err(TutorError::config_validation(
                format!(
                    "session.practiceItemCount must be at most 20, got {}",
                    self.practice_item_count
                ),
                "Set session.practiceItemCount to a value such as 3 in your tutor.json",
            ));
        }

        if self.max_source_chars == 0 {
            return Err(TutorError::config_validation(
                "session.maxSourceChars must be greater than 0",
                "Set session.maxSourceChars to at least 1 in your tutor.json",
            ));
        }

        let PerformanceThresholds { strong, partial } = self.thresholds;
        if partial == 0 || partial >= strong || strong > 100 {
            return Err(TutorError::config_validation(
                format!(
                    "session.thresholds must satisfy 0 < partial < strong <= 100, got partial={partial}, strong={strong}"
                ),
                "Use the defaults {\"strong\": 80, \"partial\": 60} or adjust them in your tutor.json",
            ));
        }

        Ok(())
    }
}
