//! Session orchestration.
//!
//! [`SessionOrchestrator`] owns one adaptive session. It builds prompts,
//! calls the generation client, runs the raw text through the normalizer and
//! validator, and drives the [`SessionState`] machine in response to learner
//! actions.
//!
//! # Concurrency
//!
//! Session data lives behind a `tokio` mutex that is never held while the
//! generation client is awaited. Two pieces of bookkeeping guard the await:
//!
//! - an *epoch* that increases whenever the session is restarted or closed,
//!   so a result that arrives for an older epoch is discarded;
//! - a *pending* marker holding the epoch of the outstanding generation call,
//!   so at most one call per session is ever in flight.
//!
//! The pending marker is cleared by a drop guard, so a caller that abandons
//! its future (for example a disconnected HTTP client) does not wedge the
//! session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SessionSettings;
use crate::error::{GenerationFailure, Result, TutorError};
use crate::generation::GenerationClient;
use crate::module::LearningModule;
use crate::normalizer::normalize;
use crate::progress::{ProgressRecord, ProgressSink};
use crate::prompt::{build_module_prompt, ModuleRequest, PriorPerformance};
use crate::quiz::PerformanceLevel;
use crate::session::{Phase, PhaseContent, QuizOutcome, SessionState};
use crate::validator::validate;

/// Marker value meaning no generation call is outstanding.
const NOT_PENDING: u64 = 0;

/// What the learner currently sees, plus session-level context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Subject of the session.
    pub subject: String,
    /// Number of the current module.
    pub module_number: u32,
    /// Title of the current module.
    pub module_title: String,
    /// Current phase.
    pub phase: Phase,
    /// Data visible in the current phase.
    pub content: PhaseContent,
    /// Score of the current module's quiz, once evaluated.
    pub last_score: Option<u8>,
    /// Performance level of the current module's quiz, once evaluated.
    pub performance_level: Option<PerformanceLevel>,
    /// Whether a new module is being generated.
    pub generating: bool,
}

/// A started session.
#[derive(Debug)]
struct ActiveSession {
    subject: String,
    source_material: Option<String>,
    state: SessionState,
}

impl ActiveSession {
    fn view(&self, generating: bool) -> Result<SessionView> {
        let module = self
            .state
            .current_module()
            .ok_or(TutorError::NoActiveModule)?;

        Ok(SessionView {
            subject: self.subject.clone(),
            module_number: module.module_number,
            module_title: module.title.clone(),
            phase: self.state.phase(),
            content: self.state.visible_content()?,
            last_score: self.state.last_score(),
            performance_level: self.state.performance_level(),
            generating,
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    epoch: u64,
    session: Option<ActiveSession>,
}

/// Where a freshly generated module goes once it arrives.
enum Target {
    /// Start a new session with this subject and source material.
    Start {
        subject: String,
        source_material: Option<String>,
    },
    /// Replace the module of the running session.
    Next,
}

/// Clears the pending marker when a generation call ends or is abandoned.
struct PendingGuard<'a> {
    pending: &'a AtomicU64,
    epoch: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // A restart may already have claimed the marker for a newer epoch.
        let _ = self.pending.compare_exchange(
            self.epoch,
            NOT_PENDING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// Drives one adaptive learning session.
pub struct SessionOrchestrator<C> {
    client: C,
    settings: SessionSettings,
    progress: Option<Arc<dyn ProgressSink>>,
    inner: Mutex<Inner>,
    pending: AtomicU64,
}

impl<C> std::fmt::Debug for SessionOrchestrator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("settings", &self.settings)
            .field("has_progress_sink", &self.progress.is_some())
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<C: GenerationClient> SessionOrchestrator<C> {
    /// Creates an orchestrator with no session started.
    pub fn new(client: C, settings: SessionSettings) -> Self {
        Self {
            client,
            settings,
            progress: None,
            inner: Mutex::new(Inner::default()),
            pending: AtomicU64::new(NOT_PENDING),
        }
    }

    /// Hands every evaluated module to `sink`.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The generation client.
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// The session settings.
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Returns `true` while a generation call is outstanding.
    pub fn is_generating(&self) -> bool {
        self.pending.load(Ordering::SeqCst) != NOT_PENDING
    }

    /// Starts (or restarts) a session and generates module 1.
    ///
    /// A restart supersedes any generation still in flight for the previous
    /// session. The previous session stays visible until module 1 arrives;
    /// if generation fails it is left untouched.
    pub async fn start_session(
        &self,
        subject: &str,
        source_material: Option<&str>,
    ) -> Result<SessionView> {
        let subject = subject.trim().to_string();
        let source_material = source_material
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);

        let epoch = {
            let mut inner = self.inner.lock().await;
            inner.epoch += 1;
            self.pending.store(inner.epoch, Ordering::SeqCst);
            inner.epoch
        };
        let guard = PendingGuard {
            pending: &self.pending,
            epoch,
        };

        info!(subject = %subject, has_source = source_material.is_some(), "Starting session");

        let request = ModuleRequest {
            subject: &subject,
            module_number: 1,
            prior: None,
            source_material: source_material.as_deref(),
            quiz_item_count: self.settings.quiz_item_count,
            practice_item_count: self.settings.practice_item_count,
            max_source_chars: self.settings.max_source_chars,
        };
        let prompt = build_module_prompt(&request);
        let outcome = self.client.generate(&prompt).await;

        self.apply(
            epoch,
            1,
            outcome,
            Target::Start {
                subject,
                source_material,
            },
            guard,
        )
        .await
    }

    /// Generates the next module, adapted to the current module's result.
    ///
    /// Only valid from the summary phase. Fails with
    /// `TutorError::GenerationInProgress` without contacting the client if a
    /// generation call is already outstanding.
    pub async fn request_next_module(&self) -> Result<SessionView> {
        let (epoch, module_number, prompt) = {
            let inner = self.inner.lock().await;
            let session = inner.session.as_ref().ok_or(TutorError::NoActiveModule)?;
            let module = session
                .state
                .current_module()
                .ok_or(TutorError::NoActiveModule)?;

            if !session.state.phase().is_terminal() {
                return Err(TutorError::invalid_transition(
                    session.state.phase(),
                    "request the next module",
                ));
            }

            if self
                .pending
                .compare_exchange(NOT_PENDING, inner.epoch, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                warn!("Next module requested while a generation call is in flight");
                return Err(TutorError::GenerationInProgress);
            }

            let prior = prior_performance(&session.state, module);
            let module_number = module.module_number + 1;
            let request = ModuleRequest {
                subject: &session.subject,
                module_number,
                prior: prior.as_ref(),
                source_material: session.source_material.as_deref(),
                quiz_item_count: self.settings.quiz_item_count,
                practice_item_count: self.settings.practice_item_count,
                max_source_chars: self.settings.max_source_chars,
            };

            info!(
                module_number,
                level = ?prior.as_ref().map(|p| p.level),
                "Requesting next module"
            );

            (inner.epoch, module_number, build_module_prompt(&request))
        };
        let guard = PendingGuard {
            pending: &self.pending,
            epoch,
        };

        let outcome = self.client.generate(&prompt).await;
        self.apply(epoch, module_number, outcome, Target::Next, guard)
            .await
    }

    /// Turns a generation outcome into session state, unless it is stale.
    async fn apply(
        &self,
        epoch: u64,
        module_number: u32,
        outcome: std::result::Result<String, GenerationFailure>,
        target: Target,
        guard: PendingGuard<'_>,
    ) -> Result<SessionView> {
        let mut inner = self.inner.lock().await;
        drop(guard);

        if inner.epoch != epoch {
            warn!(
                module_number,
                epoch,
                current_epoch = inner.epoch,
                "Discarding generation result for a superseded session"
            );
            return Err(TutorError::SessionSuperseded { module_number });
        }

        let raw = outcome.map_err(|source| {
            warn!(module_number, error = %source, "Module generation failed");
            TutorError::module_generation_failed(module_number, source)
        })?;

        let module = build_module(&raw, module_number);

        match target {
            Target::Start {
                subject,
                source_material,
            } => {
                inner.session = Some(ActiveSession {
                    subject,
                    source_material,
                    state: SessionState::with_module(module),
                });
            }
            Target::Next => {
                let session = inner.session.as_mut().ok_or(TutorError::NoActiveModule)?;
                session.state = SessionState::with_module(module);
            }
        }

        let session = inner.session.as_ref().ok_or(TutorError::NoActiveModule)?;
        session.view(self.is_generating())
    }

    /// Moves to the next phase of the current module.
    pub async fn advance(&self) -> Result<SessionView> {
        let mut inner = self.inner.lock().await;
        let session = inner.session.as_mut().ok_or(TutorError::NoActiveModule)?;
        let phase = session.state.advance()?;
        debug!(%phase, "Advanced");
        session.view(self.is_generating())
    }

    /// Revisits any phase of the current module.
    pub async fn jump_to(&self, phase: Phase) -> Result<SessionView> {
        let mut inner = self.inner.lock().await;
        let session = inner.session.as_mut().ok_or(TutorError::NoActiveModule)?;
        session.state.jump_to(phase)?;
        debug!(%phase, "Jumped");
        session.view(self.is_generating())
    }

    /// Records the answer to quiz item `index`.
    pub async fn submit_answer(&self, index: usize, value: &str) -> Result<SessionView> {
        let mut inner = self.inner.lock().await;
        let session = inner.session.as_mut().ok_or(TutorError::NoActiveModule)?;
        session.state.submit_answer(index, value)?;
        debug!(index, "Answer recorded");
        session.view(self.is_generating())
    }

    /// Scores the quiz and moves to the summary phase.
    ///
    /// The result is handed to the progress sink, if any, on the blocking
    /// thread pool; sink failures are logged and do not affect the outcome.
    pub async fn evaluate(&self) -> Result<QuizOutcome> {
        let (outcome, record) = {
            let mut inner = self.inner.lock().await;
            let session = inner.session.as_mut().ok_or(TutorError::NoActiveModule)?;
            let outcome = session.state.evaluate(&self.settings.thresholds)?;

            let record = ProgressRecord {
                subject: session.subject.clone(),
                module_number: outcome.module_number,
                module_title: session
                    .state
                    .current_module()
                    .map(|m| m.title.clone())
                    .unwrap_or_default(),
                score: outcome.score,
                performance_level: outcome.performance_level,
                recorded_at: Utc::now(),
            };
            (outcome, record)
        };

        info!(
            module_number = outcome.module_number,
            score = outcome.score,
            level = %outcome.performance_level,
            "Quiz evaluated"
        );

        if let Some(sink) = &self.progress {
            let sink = Arc::clone(sink);
            match tokio::task::spawn_blocking(move || sink.record(&record)).await {
                Ok(Ok(())) => debug!("Progress recorded"),
                Ok(Err(e)) => warn!(error = %e, "Failed to record progress"),
                Err(e) => warn!(error = %e, "Progress sink task failed"),
            }
        }

        Ok(outcome)
    }

    /// Returns what the learner currently sees.
    pub async fn snapshot(&self) -> Result<SessionView> {
        let inner = self.inner.lock().await;
        let session = inner.session.as_ref().ok_or(TutorError::NoActiveModule)?;
        session.view(self.is_generating())
    }

    /// Returns a copy of the full session state, if a session is running.
    pub async fn state(&self) -> Option<SessionState> {
        let inner = self.inner.lock().await;
        inner.session.as_ref().map(|s| s.state.clone())
    }

    /// Closes the session.
    ///
    /// Any generation still in flight is discarded when it arrives.
    pub async fn exit(&self) {
        let mut inner = self.inner.lock().await;
        inner.epoch += 1;
        inner.session = None;
        self.pending.store(NOT_PENDING, Ordering::SeqCst);
        info!("Session closed");
    }
}

/// Runs raw generator output through the normalizer and validator.
fn build_module(raw: &str, module_number: u32) -> LearningModule {
    let normalized = normalize(raw);
    let module = validate(&normalized.candidate, module_number);
    info!(
        module_number,
        source = %normalized.source,
        title = %module.title,
        quiz_items = module.quiz_items.len(),
        "Module ready"
    );
    if !module.has_quiz() {
        warn!(module_number, "Module has no quiz items; it cannot be evaluated");
    }
    module
}

/// Reads back the current module's result for the next prompt.
fn prior_performance(state: &SessionState, module: &LearningModule) -> Option<PriorPerformance> {
    let level = state.performance_level()?;
    let score = state.last_score()?;
    Some(PriorPerformance {
        level,
        score,
        previous_title: module.title.clone(),
        missed_questions: module.quiz_questions(state.missed_items()),
    })
}
