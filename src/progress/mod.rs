//! Progress estimation for running generation sessions.
//!
//! Progress is a visual estimate derived from elapsed time, not from provider
//! completion. The controller always publishes 1.0 on actual success.

pub mod clock;
pub mod estimator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use estimator::{DEFAULT_SMOOTHING, ProgressEstimate, ProgressEstimator, remaining_time};
