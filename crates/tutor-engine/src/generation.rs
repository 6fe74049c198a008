//! The boundary to the external text-generation service.
//!
//! The engine only depends on [`GenerationClient`]. [`ChatCompletionsClient`]
//! is the production implementation for OpenAI-compatible
//! `chat/completions` endpoints. Every call is a single attempt: retrying is
//! left to the learner.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{GenerationFailure, Result, TutorError};
use crate::prompt::GenerationPrompt;

/// Maximum number of response body characters kept in a failure message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Produces raw lesson text for a prompt.
///
/// Implementations perform exactly one attempt per call and report transport
/// or service errors as [`GenerationFailure`].
pub trait GenerationClient: Send + Sync {
    /// Sends `prompt` to the generation service and returns its raw text.
    fn generate(
        &self,
        prompt: &GenerationPrompt,
    ) -> impl Future<Output = std::result::Result<String, GenerationFailure>> + Send;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 2],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatResponse {
    fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

// ============================================================================
// ChatCompletionsClient
// ============================================================================

/// Generation client for OpenAI-compatible chat completion APIs.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsClient {
    /// Creates a client for `endpoint` (the API base, e.g. `https://api.openai.com/v1`).
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        temperature: f32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationFailure::transport(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: completions_url(endpoint),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }

    /// Creates a client from configuration, reading the API key from the
    /// configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigValidationError` if the variable is unset or
    /// empty.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                TutorError::config_validation(
                    format!("environment variable {} is not set", config.api_key_env),
                    format!(
                        "Export {} with your API key, or change generator.apiKeyEnv in your tutor.json",
                        config.api_key_env
                    ),
                )
            })?;

        Self::new(
            &config.endpoint,
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
            config.temperature,
        )
    }

    /// The full `chat/completions` URL requests are sent to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, prompt: &GenerationPrompt) -> std::result::Result<String, GenerationFailure> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system".into(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.user.clone(),
                },
            ],
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationFailure::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = crate::normalizer::truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS);
            return Err(GenerationFailure::status(status.as_u16(), message));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationFailure::transport(format!("invalid response body: {e}")))?;

        body.first_content()
            .map(ToString::to_string)
            .ok_or_else(|| GenerationFailure::transport("response contained no choices"))
    }
}

impl GenerationClient for ChatCompletionsClient {
    async fn generate(
        &self,
        prompt: &GenerationPrompt,
    ) -> std::result::Result<String, GenerationFailure> {
        debug!(url = %self.url, model = %self.model, "Requesting generation");
        self.send(prompt).await
    }
}

/// Appends `/chat/completions` to an API base URL.
fn completions_url(endpoint: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}
