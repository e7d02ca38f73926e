use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::StepKind;
use crate::timeline::TimelineStyle;

pub type SessionId = Uuid;

/// Lifecycle state of an in-flight session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Running,
    Paused,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Running => write!(f, "running"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// One generation request and its progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSession {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub decision_text: String,
    pub style: TimelineStyle,
    pub current_step: StepKind,
    /// 0.0 to 1.0, never decreasing while the session lives
    pub progress: f64,
    pub estimated_completion: DateTime<Utc>,
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationSession {
    pub fn new(
        decision_text: String,
        style: TimelineStyle,
        first_step: StepKind,
        started_at: DateTime<Utc>,
        estimated_completion: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            decision_text,
            style,
            current_step: first_step,
            progress: 0.0,
            estimated_completion,
            state: SessionState::Running,
            error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }
}
