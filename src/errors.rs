//! Typed error hierarchy for futurecast.
//!
//! Three top-level enums cover the three subsystems:
//! - `GenerationError` for session lifecycle and pipeline failures
//! - `CacheError` for snapshot persistence, export and import
//! - `SyncError` for remote reconciliation

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::step::StepKind;

/// Errors from the generation session controller.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Decision text is empty")]
    EmptyDecision,

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: StepKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("Session {id} not found")]
    SessionNotFound { id: Uuid },

    #[error("Session {id} is not paused")]
    SessionNotPaused { id: Uuid },

    #[error("Session {id} was cancelled")]
    Cancelled { id: Uuid },

    #[error("Session {id} was paused")]
    Paused { id: Uuid },
}

impl GenerationError {
    /// The step that failed, for `StepFailed`.
    pub fn failed_step(&self) -> Option<StepKind> {
        match self {
            GenerationError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Errors from timeline cache persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Corrupt cache snapshot: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Unsupported cache snapshot version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Failed to encode cache snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Cache file error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Blob store error: {0}")]
    Store(#[source] anyhow::Error),
}

/// Errors from remote sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("User id is empty")]
    InvalidUser,

    #[error("Failed to fetch timelines for user {user_id}: {source}")]
    Fetch {
        user_id: String,
        #[source]
        source: anyhow::Error,
    },
}
