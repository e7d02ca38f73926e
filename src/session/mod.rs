//! Generation sessions: model, observable status and the controller.

pub mod controller;
pub mod model;
pub mod status;

pub use controller::{DEFAULT_TICK_INTERVAL, GenerationController, GenerationSettings};
pub use model::{GenerationSession, SessionId, SessionState};
pub use status::{GenerationPhase, GenerationStatus};
