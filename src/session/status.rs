use serde::Serialize;
use std::time::Duration;

use super::model::{GenerationSession, SessionId};
use crate::progress::remaining_time;
use crate::step::StepKind;

/// Coarse observable state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationPhase {
    #[default]
    Idle,
    Running,
    Failed,
}

/// Snapshot published to observers on every tick and transition.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GenerationStatus {
    pub phase: GenerationPhase,
    pub session_id: Option<SessionId>,
    pub progress: f64,
    pub current_step: Option<StepKind>,
    pub estimated_time_remaining: Option<Duration>,
    pub error: Option<String>,
}

impl GenerationStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Idle after a successful session, showing completion.
    pub fn completed(id: SessionId) -> Self {
        Self {
            session_id: Some(id),
            progress: 1.0,
            ..Self::default()
        }
    }

    pub fn running(session: &GenerationSession, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            phase: GenerationPhase::Running,
            session_id: Some(session.id),
            progress: session.progress,
            current_step: Some(session.current_step),
            estimated_time_remaining: Some(remaining_time(session.estimated_completion, now)),
            error: None,
        }
    }

    pub fn failed(session: &GenerationSession, message: String) -> Self {
        Self {
            phase: GenerationPhase::Failed,
            session_id: Some(session.id),
            progress: session.progress,
            current_step: Some(session.current_step),
            estimated_time_remaining: None,
            error: Some(message),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == GenerationPhase::Idle
    }
}
