//! Generation session controller.
//!
//! Drives each session through the step registry, one provider call per step,
//! and publishes a `GenerationStatus` on a watch channel. Sessions run
//! independently; the observable status follows the most recently started
//! (driving) session.
//!
//! Cancellation and pause are cooperative: an in-flight provider call is never
//! aborted, its result is discarded at the next step boundary.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::TimeDelta;
use tokio::sync::watch;

use super::model::{GenerationSession, SessionId, SessionState};
use super::status::GenerationStatus;
use crate::cache::TimelineCache;
use crate::errors::GenerationError;
use crate::periodic::PeriodicTask;
use crate::progress::{Clock, DEFAULT_SMOOTHING, ProgressEstimator};
use crate::provider::InferenceProvider;
use crate::step::{StepKind, StepRegistry};
use crate::timeline::{Timeline, TimelineStyle};

/// Default progress tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Tunables for the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub tick_interval: Duration,
    pub smoothing: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

struct SessionSlot {
    session: GenerationSession,
    ticker: Option<PeriodicTask>,
}

#[derive(Default)]
struct ActiveSet {
    sessions: HashMap<SessionId, SessionSlot>,
    /// Session whose progress is published on the status channel
    driving: Option<SessionId>,
}

struct Shared {
    estimator: ProgressEstimator,
    clock: Arc<dyn Clock>,
    active: Mutex<ActiveSet>,
    status_tx: watch::Sender<GenerationStatus>,
    last_failed: Mutex<Option<GenerationSession>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ActiveSet> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, status: GenerationStatus) {
        self.status_tx.send_replace(status);
    }

    fn tick(&self, id: SessionId) -> ControlFlow<()> {
        let now = self.clock.now();
        let mut active = self.lock();
        let driving = active.driving == Some(id);
        let Some(slot) = active.sessions.get_mut(&id) else {
            return ControlFlow::Break(());
        };
        if !slot.session.is_running() {
            return ControlFlow::Break(());
        }

        let session = &mut slot.session;
        let estimate = self.estimator.estimate(
            session.started_at,
            session.estimated_completion,
            now,
            session.current_step,
            session.progress,
        );
        session.progress = estimate.progress;
        session.current_step = estimate.step;
        tracing::debug!(
            session = %id,
            progress = estimate.progress,
            step = estimate.step.key(),
            "Progress tick"
        );

        if driving {
            self.publish(GenerationStatus::running(session, now));
        }
        ControlFlow::Continue(())
    }
}

/// Owns every active generation session.
///
/// Cheap to clone; clones share sessions and the status channel.
#[derive(Clone)]
pub struct GenerationController {
    shared: Arc<Shared>,
    provider: Arc<dyn InferenceProvider>,
    cache: Option<TimelineCache>,
    tick_interval: Duration,
}

impl GenerationController {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        registry: StepRegistry,
        clock: Arc<dyn Clock>,
        settings: GenerationSettings,
    ) -> Self {
        let (status_tx, _) = watch::channel(GenerationStatus::idle());
        Self {
            shared: Arc::new(Shared {
                estimator: ProgressEstimator::new(registry, settings.smoothing),
                clock,
                active: Mutex::new(ActiveSet::default()),
                status_tx,
                last_failed: Mutex::new(None),
            }),
            provider,
            cache: None,
            tick_interval: settings.tick_interval,
        }
    }

    /// Hand every produced timeline to `cache`.
    pub fn with_cache(mut self, cache: TimelineCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        self.shared.estimator.registry()
    }

    /// Run a full generation session and return the produced timeline.
    pub async fn start_generation(
        &self,
        decision: &str,
        style: TimelineStyle,
    ) -> Result<Timeline, GenerationError> {
        let text = decision.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyDecision);
        }

        let id = self.begin(text.to_string(), style);
        tracing::info!(session = %id, style = %style, "Generation session started");

        match self.run_pipeline(id, text, style).await {
            Ok(timeline) => self.complete(id, timeline),
            Err(err) => Err(self.fail(id, err)),
        }
    }

    /// Drop a session's bookkeeping and stop its ticker.
    ///
    /// Returns `false` for unknown or already finished sessions.
    pub fn cancel_generation(&self, id: SessionId) -> bool {
        let mut active = self.shared.lock();
        if active.sessions.remove(&id).is_none() {
            tracing::debug!(session = %id, "Cancel ignored for unknown session");
            return false;
        }
        if active.driving == Some(id) {
            active.driving = None;
            self.shared.publish(GenerationStatus::idle());
        }
        tracing::info!(session = %id, "Generation session cancelled");
        true
    }

    /// Stop the ticker and hold the session at its next step boundary.
    pub fn pause_generation(&self, id: SessionId) -> Result<(), GenerationError> {
        let mut active = self.shared.lock();
        let driving = active.driving == Some(id);
        let slot = active
            .sessions
            .get_mut(&id)
            .ok_or(GenerationError::SessionNotFound { id })?;
        if slot.session.state == SessionState::Paused {
            return Ok(());
        }

        slot.session.state = SessionState::Paused;
        slot.ticker = None;
        if driving {
            active.driving = None;
            self.shared.publish(GenerationStatus::idle());
        }
        tracing::info!(session = %id, "Generation session paused");
        Ok(())
    }

    /// Restart a paused session from the first step under a new session id.
    pub async fn resume_generation(&self, id: SessionId) -> Result<Timeline, GenerationError> {
        let (text, style) = {
            let mut active = self.shared.lock();
            match active.sessions.get(&id) {
                None => return Err(GenerationError::SessionNotFound { id }),
                Some(slot) if slot.session.state != SessionState::Paused => {
                    return Err(GenerationError::SessionNotPaused { id });
                }
                Some(_) => {}
            }
            match active.sessions.remove(&id) {
                Some(slot) => (slot.session.decision_text, slot.session.style),
                None => return Err(GenerationError::SessionNotFound { id }),
            }
        };

        tracing::info!(session = %id, "Resuming paused session from the first step");
        self.start_generation(&text, style).await
    }

    /// Snapshot of all active sessions, oldest first.
    pub fn active_sessions(&self) -> Vec<GenerationSession> {
        let active = self.shared.lock();
        let mut sessions: Vec<_> = active
            .sessions
            .values()
            .map(|slot| slot.session.clone())
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    pub fn session(&self, id: SessionId) -> Option<GenerationSession> {
        self.shared
            .lock()
            .sessions
            .get(&id)
            .map(|slot| slot.session.clone())
    }

    /// The most recent failed session, kept for inspection.
    pub fn last_failure(&self) -> Option<GenerationSession> {
        self.shared
            .last_failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> GenerationStatus {
        self.shared.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Cancel every session and stop every ticker.
    pub fn shutdown(&self) {
        let mut active = self.shared.lock();
        let count = active.sessions.len();
        active.sessions.clear();
        active.driving = None;
        self.shared.publish(GenerationStatus::idle());
        if count > 0 {
            tracing::info!("Cancelled {} active generation session(s)", count);
        }
    }

    fn begin(&self, text: String, style: TimelineStyle) -> SessionId {
        let registry = self.registry();
        let now = self.shared.clock.now();
        let total = TimeDelta::from_std(registry.total_duration()).unwrap_or(TimeDelta::zero());
        let session = GenerationSession::new(text, style, registry.first().kind, now, now + total);
        let id = session.id;

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let ticker = PeriodicTask::spawn(self.tick_interval, move || match weak.upgrade() {
            Some(shared) => shared.tick(id),
            None => ControlFlow::Break(()),
        });

        let mut active = self.shared.lock();
        self.shared.publish(GenerationStatus::running(&session, now));
        active.sessions.insert(
            id,
            SessionSlot {
                session,
                ticker: Some(ticker),
            },
        );
        active.driving = Some(id);
        id
    }

    async fn run_pipeline(
        &self,
        id: SessionId,
        text: &str,
        style: TimelineStyle,
    ) -> Result<Timeline, GenerationError> {
        let provider = &self.provider;

        self.enter_step(id, StepKind::AnalyzingDecision)?;
        let summary = self.finish(
            id,
            StepKind::AnalyzingDecision,
            provider.analyze_decision_text(text).await,
        )?;
        tracing::debug!(session = %id, themes = ?summary.themes, "Decision analyzed");

        self.enter_step(id, StepKind::ProcessingContext)?;
        let context = self.finish(
            id,
            StepKind::ProcessingContext,
            provider.process_context(text, style).await,
        )?;
        tracing::debug!(session = %id, factors = context.factors.len(), "Context processed");

        self.enter_step(id, StepKind::GeneratingPerspectives)?;
        let paths = self.finish(
            id,
            StepKind::GeneratingPerspectives,
            provider.generate_perspectives(text, style).await,
        )?;

        self.enter_step(id, StepKind::CreatingVisuals)?;
        let assets = self.finish(
            id,
            StepKind::CreatingVisuals,
            provider.generate_visuals(&paths, style).await,
        )?;

        self.enter_step(id, StepKind::RenderingVideo)?;
        let video = self.finish(
            id,
            StepKind::RenderingVideo,
            provider.render_video(&assets, style).await,
        )?;

        self.enter_step(id, StepKind::AssemblingTimeline)?;
        self.finish(
            id,
            StepKind::AssemblingTimeline,
            provider.assemble_timeline(text, style, paths, Some(video)).await,
        )
    }

    /// Record a step transition, or stop if the session was cancelled or paused.
    fn enter_step(&self, id: SessionId, step: StepKind) -> Result<(), GenerationError> {
        let now = self.shared.clock.now();
        let mut active = self.shared.lock();
        let driving = active.driving == Some(id);
        let slot = active
            .sessions
            .get_mut(&id)
            .ok_or(GenerationError::Cancelled { id })?;
        if slot.session.state == SessionState::Paused {
            return Err(GenerationError::Paused { id });
        }

        let lower_bound = self.registry().lower_bound_of(step);
        slot.session.current_step = step;
        slot.session.progress = slot.session.progress.max(lower_bound);
        tracing::debug!(session = %id, step = step.key(), "Entering step");

        if driving {
            self.shared.publish(GenerationStatus::running(&slot.session, now));
        }
        Ok(())
    }

    /// Accept a provider result only if the session is still running.
    fn finish<T>(
        &self,
        id: SessionId,
        step: StepKind,
        result: anyhow::Result<T>,
    ) -> Result<T, GenerationError> {
        let active = self.shared.lock();
        match active.sessions.get(&id) {
            None => Err(GenerationError::Cancelled { id }),
            Some(slot) if slot.session.state == SessionState::Paused => {
                Err(GenerationError::Paused { id })
            }
            Some(_) => result.map_err(|source| GenerationError::StepFailed { step, source }),
        }
    }

    fn complete(&self, id: SessionId, timeline: Timeline) -> Result<Timeline, GenerationError> {
        if !timeline.has_balanced_probabilities() {
            tracing::warn!(
                session = %id,
                timeline = %timeline.id,
                total = timeline.probability_total(),
                "Path probabilities do not sum to 1.0"
            );
        }

        {
            let mut active = self.shared.lock();
            if active.sessions.remove(&id).is_none() {
                return Err(GenerationError::Cancelled { id });
            }
            // Cached before completion is visible to subscribers
            if let Some(cache) = &self.cache {
                cache.cache_timeline(timeline.clone());
            }
            if active.driving == Some(id) {
                active.driving = None;
                self.shared.publish(GenerationStatus::completed(id));
            }
        }

        tracing::info!(
            session = %id,
            timeline = %timeline.id,
            paths = timeline.paths.len(),
            "Generation session completed"
        );
        Ok(timeline)
    }

    fn fail(&self, id: SessionId, err: GenerationError) -> GenerationError {
        if !matches!(err, GenerationError::StepFailed { .. }) {
            tracing::debug!(session = %id, "Generation stopped: {}", err);
            return err;
        }
        if let GenerationError::StepFailed { step, source } = &err {
            tracing::warn!(
                session = %id,
                step = step.key(),
                "Generation step failed: {:#}",
                source
            );
        }

        let mut active = self.shared.lock();
        let driving = active.driving == Some(id);
        if let Some(slot) = active.sessions.remove(&id) {
            let mut session = slot.session;
            session.state = SessionState::Failed;
            session.error = Some(err.to_string());
            if driving {
                active.driving = None;
                self.shared.publish(GenerationStatus::failed(&session, err.to_string()));
            }
            *self
                .shared
                .last_failed
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(session);
        }
        err
    }
}
