//! Inference provider seam.
//!
//! The controller drives one provider call per pipeline step. Each output
//! feeds the next call; the provider decides how many decision paths exist.

pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::timeline::{DecisionPath, Timeline, TimelineStyle};

pub use simulated::SimulatedProvider;

/// Output of the decision analysis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub summary: String,
    pub themes: Vec<String>,
}

/// Output of the context processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub style: TimelineStyle,
    pub factors: Vec<String>,
}

/// Reference to a generated visual asset for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub path_id: String,
    pub uri: String,
}

/// Reference to a rendered video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub uri: String,
}

/// Abstraction over the AI inference and rendering backend for testability.
/// Shipped implementation: `SimulatedProvider`.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn analyze_decision_text(&self, text: &str) -> Result<DecisionSummary>;

    async fn process_context(&self, text: &str, style: TimelineStyle) -> Result<DecisionContext>;

    async fn generate_perspectives(
        &self,
        text: &str,
        style: TimelineStyle,
    ) -> Result<Vec<DecisionPath>>;

    async fn generate_visuals(
        &self,
        paths: &[DecisionPath],
        style: TimelineStyle,
    ) -> Result<Vec<AssetRef>>;

    async fn render_video(&self, assets: &[AssetRef], style: TimelineStyle) -> Result<VideoRef>;

    async fn assemble_timeline(
        &self,
        text: &str,
        style: TimelineStyle,
        paths: Vec<DecisionPath>,
        video: Option<VideoRef>,
    ) -> Result<Timeline>;
}
