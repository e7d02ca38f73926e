use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::step::{StepKind, StepRegistry};

/// Default smoothing factor pulling progress toward the current step's weight.
pub const DEFAULT_SMOOTHING: f64 = 0.3;

/// One progress sample for a running session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEstimate {
    /// Elapsed share of the total nominal duration
    pub raw: f64,
    /// Smoothed, clamped and monotonic progress
    pub progress: f64,
    /// Step derived from `progress`
    pub step: StepKind,
    pub remaining: Duration,
}

/// Converts elapsed time and the current step into a published progress value.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    registry: StepRegistry,
    smoothing: f64,
}

impl ProgressEstimator {
    pub fn new(registry: StepRegistry, smoothing: f64) -> Self {
        Self {
            registry,
            smoothing,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// `min(1, elapsed / total)`; zero before the start instant.
    pub fn raw_progress(&self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let total = self.registry.total_duration().as_secs_f64();
        if total <= 0.0 {
            return 1.0;
        }
        let elapsed = (now - started_at).to_std().unwrap_or(Duration::ZERO);
        (elapsed.as_secs_f64() / total).min(1.0)
    }

    /// Pull `raw` toward the step's cumulative weight, clamped to [0, 1].
    pub fn smooth(&self, raw: f64, step: StepKind) -> f64 {
        let weight = self.registry.weight_of(step);
        (weight + (raw - weight) * self.smoothing).clamp(0.0, 1.0)
    }

    pub fn estimate(
        &self,
        started_at: DateTime<Utc>,
        estimated_completion: DateTime<Utc>,
        now: DateTime<Utc>,
        current_step: StepKind,
        previous: f64,
    ) -> ProgressEstimate {
        let raw = self.raw_progress(started_at, now);
        let progress = self.smooth(raw, current_step).max(previous);
        ProgressEstimate {
            raw,
            progress,
            step: self.registry.step_for_progress(progress),
            remaining: remaining_time(estimated_completion, now),
        }
    }
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::new(StepRegistry::reference(), DEFAULT_SMOOTHING)
    }
}

/// `max(0, estimated_completion - now)`.
pub fn remaining_time(estimated_completion: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (estimated_completion - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_raw_progress_caps_at_one() {
        let estimator = ProgressEstimator::default();
        let t0 = start();
        assert_eq!(estimator.raw_progress(t0, t0), 0.0);
        let half = estimator.raw_progress(t0, t0 + TimeDelta::milliseconds(22_500));
        assert!((half - 0.5).abs() < 1e-9);
        assert_eq!(estimator.raw_progress(t0, t0 + TimeDelta::seconds(90)), 1.0);
    }

    #[test]
    fn test_raw_progress_before_start_is_zero() {
        let estimator = ProgressEstimator::default();
        let t0 = start();
        assert_eq!(estimator.raw_progress(t0, t0 - TimeDelta::seconds(5)), 0.0);
    }

    #[test]
    fn test_estimate_mid_creating_visuals() {
        let estimator = ProgressEstimator::default();
        let t0 = start();
        let completion = t0 + TimeDelta::seconds(45);
        let now = t0 + TimeDelta::seconds(20);

        let estimate = estimator.estimate(t0, completion, now, StepKind::CreatingVisuals, 0.0);

        // 0.65 + (20/45 - 0.65) * 0.3
        assert!((estimate.progress - 0.588_333).abs() < 1e-4);
        assert_eq!(estimate.step, StepKind::CreatingVisuals);
        assert_eq!(estimate.remaining, Duration::from_secs(25));
    }

    #[test]
    fn test_estimate_is_monotonic() {
        let estimator = ProgressEstimator::default();
        let t0 = start();
        let completion = t0 + TimeDelta::seconds(45);

        let estimate = estimator.estimate(t0, completion, t0, StepKind::AnalyzingDecision, 0.4);
        assert_eq!(estimate.progress, 0.4);
        assert_eq!(estimate.step, StepKind::GeneratingPerspectives);
    }

    #[test]
    fn test_remaining_never_negative() {
        let t0 = start();
        assert_eq!(remaining_time(t0, t0 + TimeDelta::seconds(10)), Duration::ZERO);
        assert_eq!(
            remaining_time(t0 + TimeDelta::seconds(3), t0),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_smooth_clamps_into_unit_range() {
        let estimator = ProgressEstimator::new(StepRegistry::reference(), 1.5);
        assert_eq!(estimator.smooth(-1.0, StepKind::AnalyzingDecision), 0.0);
        assert_eq!(estimator.smooth(3.0, StepKind::AssemblingTimeline), 1.0);
    }
}
