//! HTTP API for driving a learning session.
//!
//! # Endpoints
//!
//! - `GET /api/session` - Current session view
//! - `POST /api/session/start` - Start or restart a session
//! - `POST /api/session/advance` - Move to the next phase
//! - `POST /api/session/jump` - Revisit a phase
//! - `POST /api/session/answers` - Submit a quiz answer
//! - `POST /api/session/evaluate` - Score the quiz
//! - `POST /api/session/next` - Generate the next module
//! - `POST /api/session/exit` - Close the session
//!
//! # Example
//!
//! ```no_run
//! use tutor_engine::{create_router, AppState, ChatCompletionsClient, Config, SessionOrchestrator};
//!
//! # async fn example() -> tutor_engine::Result<()> {
//! let config = Config::load()?;
//! let client = ChatCompletionsClient::from_config(&config.generator)?;
//! let state = AppState::new(SessionOrchestrator::new(client, config.session.clone()));
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::TutorError;
use crate::generation::GenerationClient;
use crate::orchestrator::{SessionOrchestrator, SessionView};
use crate::session::{Phase, QuizOutcome};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the start endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Subject to study.
    pub subject: String,
    /// Optional text to base the lessons on.
    #[serde(default)]
    pub source_material: Option<String>,
}

/// Request body for the jump endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JumpRequest {
    /// Phase to revisit.
    pub phase: Phase,
}

/// Request body for the answers endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// Index of the quiz item.
    pub index: usize,
    /// The learner's answer.
    pub value: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
    /// Whether repeating the request may succeed.
    pub retryable: bool,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
pub struct AppState<C> {
    /// The session driven by this server.
    pub orchestrator: Arc<SessionOrchestrator<C>>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}

impl<C: GenerationClient> AppState<C> {
    /// Creates a new `AppState` around an orchestrator.
    #[must_use]
    pub fn new(orchestrator: SessionOrchestrator<C>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The request body is well-formed but unusable.
    InvalidRequest(String),
    /// The session engine rejected the operation.
    Session(TutorError),
}

impl From<TutorError> for ApiError {
    fn from(e: TutorError) -> Self {
        Self::Session(e)
    }
}

/// Maps an engine error to its HTTP status.
const fn status_for(error: &TutorError) -> StatusCode {
    match error {
        TutorError::NoActiveModule => StatusCode::NOT_FOUND,
        TutorError::QuizItemOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        e if e.is_usage_error() => StatusCode::CONFLICT,
        TutorError::GenerationInProgress | TutorError::SessionSuperseded { .. } => {
            StatusCode::CONFLICT
        }
        TutorError::Generation(_) | TutorError::ModuleGenerationFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::InvalidRequest(error) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error,
                    retryable: false,
                },
            ),
            Self::Session(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    warn!(error = %e, "Request failed");
                }
                (
                    status,
                    ErrorResponse {
                        error: e.to_string(),
                        retryable: e.is_retryable(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// # Returns
///
/// An axum `Router` configured with:
/// - All session routes under `/api/session`
/// - CORS middleware for browser front ends
/// - Tracing middleware for request logging
pub fn create_router<C: GenerationClient + 'static>(state: AppState<C>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let session_routes = Router::new()
        .route("/", get(handle_snapshot::<C>))
        .route("/start", post(handle_start::<C>))
        .route("/advance", post(handle_advance::<C>))
        .route("/jump", post(handle_jump::<C>))
        .route("/answers", post(handle_answer::<C>))
        .route("/evaluate", post(handle_evaluate::<C>))
        .route("/next", post(handle_next::<C>))
        .route("/exit", post(handle_exit::<C>));

    Router::new()
        .nest("/api/session", session_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/session`.
async fn handle_snapshot<C: GenerationClient>(
    State(state): State<AppState<C>>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.orchestrator.snapshot().await?))
}

/// Handler for `POST /api/session/start`.
///
/// Generates module 1 for the requested subject, replacing any running
/// session.
async fn handle_start<C: GenerationClient>(
    State(state): State<AppState<C>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<SessionView>, ApiError> {
    if request.subject.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "subject must not be empty".to_string(),
        ));
    }

    info!(subject = %request.subject, "Start requested");
    let view = state
        .orchestrator
        .start_session(&request.subject, request.source_material.as_deref())
        .await?;
    Ok(Json(view))
}

/// Handler for `POST /api/session/advance`.
async fn handle_advance<C: GenerationClient>(
    State(state): State<AppState<C>>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.orchestrator.advance().await?))
}

/// Handler for `POST /api/session/jump`.
async fn handle_jump<C: GenerationClient>(
    State(state): State<AppState<C>>,
    Json(request): Json<JumpRequest>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.orchestrator.jump_to(request.phase).await?))
}

/// Handler for `POST /api/session/answers`.
async fn handle_answer<C: GenerationClient>(
    State(state): State<AppState<C>>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let view = state
        .orchestrator
        .submit_answer(request.index, &request.value)
        .await?;
    Ok(Json(view))
}

/// Handler for `POST /api/session/evaluate`.
async fn handle_evaluate<C: GenerationClient>(
    State(state): State<AppState<C>>,
) -> Result<Json<QuizOutcome>, ApiError> {
    Ok(Json(state.orchestrator.evaluate().await?))
}

/// Handler for `POST /api/session/next`.
async fn handle_next<C: GenerationClient>(
    State(state): State<AppState<C>>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.orchestrator.request_next_module().await?))
}

/// Handler for `POST /api/session/exit`.
async fn handle_exit<C: GenerationClient>(State(state): State<AppState<C>>) -> StatusCode {
    state.orchestrator.exit().await;
    StatusCode::NO_CONTENT
}

// ============================================================================
// Tests
// ============================================================================
