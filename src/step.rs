//! Step registry for the generation pipeline.
//!
//! This module provides:
//! - `StepKind`, the six pipeline stages in execution order
//! - `GenerationStep`, a stage with its cumulative progress weight and nominal duration
//! - `StepRegistry`, the validated ordered table used by the controller and the estimator
//!
//! Stage order is fixed: each stage consumes the previous stage's output.
//! Weights and durations may be overridden from configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::timeline::duration_serde;

/// Number of stages in every registry.
pub const STEP_COUNT: usize = 6;

/// One stage of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    AnalyzingDecision,
    ProcessingContext,
    GeneratingPerspectives,
    CreatingVisuals,
    RenderingVideo,
    AssemblingTimeline,
}

impl StepKind {
    /// All stages in execution order.
    pub const ALL: [StepKind; STEP_COUNT] = [
        StepKind::AnalyzingDecision,
        StepKind::ProcessingContext,
        StepKind::GeneratingPerspectives,
        StepKind::CreatingVisuals,
        StepKind::RenderingVideo,
        StepKind::AssemblingTimeline,
    ];

    /// Configuration key (snake_case).
    pub fn key(&self) -> &'static str {
        match self {
            StepKind::AnalyzingDecision => "analyzing_decision",
            StepKind::ProcessingContext => "processing_context",
            StepKind::GeneratingPerspectives => "generating_perspectives",
            StepKind::CreatingVisuals => "creating_visuals",
            StepKind::RenderingVideo => "rendering_video",
            StepKind::AssemblingTimeline => "assembling_timeline",
        }
    }

    /// Human-readable label.
    pub fn display_name(&self) -> &'static str {
        match self {
            StepKind::AnalyzingDecision => "Analyzing decision",
            StepKind::ProcessingContext => "Processing context",
            StepKind::GeneratingPerspectives => "Generating perspectives",
            StepKind::CreatingVisuals => "Creating visuals",
            StepKind::RenderingVideo => "Rendering video",
            StepKind::AssemblingTimeline => "Assembling timeline",
        }
    }

    fn reference_weight(&self) -> f64 {
        match self {
            StepKind::AnalyzingDecision => 0.15,
            StepKind::ProcessingContext => 0.25,
            StepKind::GeneratingPerspectives => 0.45,
            StepKind::CreatingVisuals => 0.65,
            StepKind::RenderingVideo => 0.85,
            StepKind::AssemblingTimeline => 1.0,
        }
    }

    fn reference_duration(&self) -> Duration {
        let secs = match self {
            StepKind::AnalyzingDecision => 3,
            StepKind::ProcessingContext => 5,
            StepKind::GeneratingPerspectives => 10,
            StepKind::CreatingVisuals => 10,
            StepKind::RenderingVideo => 12,
            StepKind::AssemblingTimeline => 5,
        };
        Duration::from_secs(secs)
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for StepKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        StepKind::ALL
            .into_iter()
            .find(|kind| kind.key() == key)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown step '{}'. Valid values: {}",
                    s,
                    StepKind::ALL.map(|k| k.key()).join(", ")
                )
            })
    }
}

/// A pipeline stage with its progress weight and nominal duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStep {
    pub kind: StepKind,
    /// Cumulative progress upper bound for this stage, in (0, 1]
    pub weight: f64,
    /// Expected wall-clock time of this stage
    #[serde(with = "duration_serde")]
    pub nominal_duration: Duration,
}

impl GenerationStep {
    pub fn new(kind: StepKind, weight: f64, nominal_duration: Duration) -> Self {
        Self {
            kind,
            weight,
            nominal_duration,
        }
    }
}

/// The validated, ordered table of pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRegistry {
    steps: Vec<GenerationStep>,
}

impl StepRegistry {
    /// Build a registry, validating order and weights.
    ///
    /// Requires exactly six stages in `StepKind::ALL` order, strictly increasing
    /// weights within (0, 1], and a final weight of 1.0.
    pub fn new(steps: Vec<GenerationStep>) -> Result<Self> {
        if steps.len() != STEP_COUNT {
            anyhow::bail!(
                "Step registry needs exactly {} steps, got {}",
                STEP_COUNT,
                steps.len()
            );
        }

        let mut previous = 0.0;
        for (step, expected) in steps.iter().zip(StepKind::ALL) {
            if step.kind != expected {
                anyhow::bail!(
                    "Step '{}' is out of order; expected '{}'",
                    step.kind.key(),
                    expected.key()
                );
            }
            if !(step.weight > previous && step.weight <= 1.0) {
                anyhow::bail!(
                    "Weight for step '{}' must be greater than {} and at most 1.0, got {}",
                    step.kind.key(),
                    previous,
                    step.weight
                );
            }
            previous = step.weight;
        }

        if (previous - 1.0).abs() > f64::EPSILON {
            anyhow::bail!("Last step weight must be 1.0, got {}", previous);
        }

        Ok(Self { steps })
    }

    /// The reference configuration: weights 0.15..1.0, 45 seconds total.
    pub fn reference() -> Self {
        Self {
            steps: reference_steps(),
        }
    }

    pub fn steps(&self) -> &[GenerationStep] {
        &self.steps
    }

    pub fn first(&self) -> &GenerationStep {
        &self.steps[0]
    }

    pub fn last(&self) -> &GenerationStep {
        &self.steps[STEP_COUNT - 1]
    }

    pub fn get(&self, kind: StepKind) -> &GenerationStep {
        &self.steps[self.position(kind)]
    }

    /// Zero-based position of a stage.
    pub fn position(&self, kind: StepKind) -> usize {
        StepKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default()
    }

    /// Cumulative upper-bound weight of a stage.
    pub fn weight_of(&self, kind: StepKind) -> f64 {
        self.get(kind).weight
    }

    /// Weight reached when the stage starts (the previous stage's upper bound).
    pub fn lower_bound_of(&self, kind: StepKind) -> f64 {
        match self.position(kind) {
            0 => 0.0,
            i => self.steps[i - 1].weight,
        }
    }

    /// Sum of all nominal durations.
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.nominal_duration).sum()
    }

    /// Derive the stage for a progress value.
    ///
    /// Uses the first range whose upper bound exceeds `progress`; values at or
    /// beyond the final bound map to the last stage.
    pub fn step_for_progress(&self, progress: f64) -> StepKind {
        if progress.is_nan() {
            return self.first().kind;
        }
        self.steps
            .iter()
            .find(|s| s.weight > progress)
            .unwrap_or_else(|| self.last())
            .kind
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::reference()
    }
}

/// Reference stage table.
pub fn reference_steps() -> Vec<GenerationStep> {
    StepKind::ALL
        .into_iter()
        .map(|kind| GenerationStep::new(kind, kind.reference_weight(), kind.reference_duration()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_registry_is_valid() {
        let registry = StepRegistry::new(reference_steps()).unwrap();
        assert_eq!(registry.steps().len(), STEP_COUNT);
        assert_eq!(registry.first().kind, StepKind::AnalyzingDecision);
        assert_eq!(registry.last().kind, StepKind::AssemblingTimeline);
        assert_eq!(registry.total_duration(), Duration::from_secs(45));
    }

    #[test]
    fn test_step_for_progress_boundaries() {
        let registry = StepRegistry::reference();
        let cases = [
            (0.0, StepKind::AnalyzingDecision),
            (0.14, StepKind::AnalyzingDecision),
            (0.15, StepKind::ProcessingContext),
            (0.16, StepKind::ProcessingContext),
            (0.24, StepKind::ProcessingContext),
            (0.25, StepKind::GeneratingPerspectives),
            (0.26, StepKind::GeneratingPerspectives),
            (0.44, StepKind::GeneratingPerspectives),
            (0.45, StepKind::CreatingVisuals),
            (0.64, StepKind::CreatingVisuals),
            (0.65, StepKind::RenderingVideo),
            (0.84, StepKind::RenderingVideo),
            (0.85, StepKind::AssemblingTimeline),
            (0.99, StepKind::AssemblingTimeline),
            (1.0, StepKind::AssemblingTimeline),
            (1.5, StepKind::AssemblingTimeline),
        ];
        for (progress, expected) in cases {
            assert_eq!(
                registry.step_for_progress(progress),
                expected,
                "progress {}",
                progress
            );
        }
    }

    #[test]
    fn test_step_for_progress_nan_maps_to_first() {
        let registry = StepRegistry::reference();
        assert_eq!(
            registry.step_for_progress(f64::NAN),
            StepKind::AnalyzingDecision
        );
    }

    #[test]
    fn test_lower_bound_and_weight() {
        let registry = StepRegistry::reference();
        assert_eq!(registry.lower_bound_of(StepKind::AnalyzingDecision), 0.0);
        assert_eq!(registry.lower_bound_of(StepKind::CreatingVisuals), 0.45);
        assert_eq!(registry.weight_of(StepKind::CreatingVisuals), 0.65);
        assert_eq!(registry.position(StepKind::RenderingVideo), 4);
    }

    #[test]
    fn test_rejects_wrong_count() {
        let mut steps = reference_steps();
        steps.pop();
        let err = StepRegistry::new(steps).unwrap_err();
        assert!(err.to_string().contains("exactly 6 steps"));
    }

    #[test]
    fn test_rejects_out_of_order() {
        let mut steps = reference_steps();
        steps.swap(1, 2);
        let err = StepRegistry::new(steps).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn test_rejects_non_increasing_weights() {
        let mut steps = reference_steps();
        steps[2].weight = 0.25;
        assert!(StepRegistry::new(steps).is_err());
    }

    #[test]
    fn test_rejects_last_weight_below_one() {
        let mut steps = reference_steps();
        steps[5].weight = 0.95;
        let err = StepRegistry::new(steps).unwrap_err();
        assert!(err.to_string().contains("must be 1.0"));
    }

    #[test]
    fn test_step_kind_from_str() {
        assert_eq!(
            "rendering_video".parse::<StepKind>().unwrap(),
            StepKind::RenderingVideo
        );
        assert!("rendering".parse::<StepKind>().is_err());
    }
}
