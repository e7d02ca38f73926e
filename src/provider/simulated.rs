use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{AssetRef, DecisionContext, DecisionSummary, InferenceProvider, VideoRef};
use crate::progress::Clock;
use crate::step::StepKind;
use crate::timeline::{
    DecisionPath, EmotionalIndicator, KeyMoment, Timeline, TimelineStyle, title_from_decision,
};

/// Length of every simulated timeline.
pub const SIMULATED_TIMELINE_DURATION: Duration = Duration::from_secs(90);

const TITLE_MAX_CHARS: usize = 60;

/// Local stand-in for the inference backend.
///
/// Produces three paths (optimistic 0.4, realistic 0.4, challenging 0.2) after
/// a fixed per-call latency. A failure can be injected at one step.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    clock: Arc<dyn Clock>,
    latency: Duration,
    fail_at: Option<StepKind>,
}

impl SimulatedProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            latency: Duration::ZERO,
            fail_at: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the call belonging to `step`.
    pub fn failing_at(mut self, step: StepKind) -> Self {
        self.fail_at = Some(step);
        self
    }

    async fn simulate(&self, step: StepKind) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_at == Some(step) {
            anyhow::bail!("simulated failure during {}", step.key());
        }
        Ok(())
    }
}

fn path(
    title: &str,
    probability: f64,
    indicator: EmotionalIndicator,
    outcome: String,
    moments: [(u64, &str); 3],
) -> DecisionPath {
    DecisionPath {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        probability,
        outcome,
        emotional_indicator: indicator,
        key_moments: moments
            .into_iter()
            .map(|(secs, title)| KeyMoment::new(Duration::from_secs(secs), title, ""))
            .collect(),
    }
}

#[async_trait]
impl InferenceProvider for SimulatedProvider {
    async fn analyze_decision_text(&self, text: &str) -> Result<DecisionSummary> {
        self.simulate(StepKind::AnalyzingDecision).await?;
        let themes = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.chars().count() > 3)
            .take(5)
            .collect();
        Ok(DecisionSummary {
            summary: title_from_decision(text, TITLE_MAX_CHARS),
            themes,
        })
    }

    async fn process_context(&self, _text: &str, style: TimelineStyle) -> Result<DecisionContext> {
        self.simulate(StepKind::ProcessingContext).await?;
        Ok(DecisionContext {
            style,
            factors: vec![
                "finances".to_string(),
                "relationships".to_string(),
                "personal growth".to_string(),
            ],
        })
    }

    async fn generate_perspectives(
        &self,
        text: &str,
        style: TimelineStyle,
    ) -> Result<Vec<DecisionPath>> {
        self.simulate(StepKind::GeneratingPerspectives).await?;
        let subject = title_from_decision(text, TITLE_MAX_CHARS);
        Ok(vec![
            path(
                "Optimistic path",
                0.4,
                EmotionalIndicator::Success,
                format!("Acting on \"{}\" pays off ({} view)", subject, style),
                [(0, "First step"), (30, "Momentum"), (75, "Breakthrough")],
            ),
            path(
                "Realistic path",
                0.4,
                EmotionalIndicator::Growth,
                format!("\"{}\" brings steady, uneven progress ({} view)", subject, style),
                [(0, "First step"), (40, "Setback"), (80, "Adjustment")],
            ),
            path(
                "Challenging path",
                0.2,
                EmotionalIndicator::Challenge,
                format!("\"{}\" tests your resolve ({} view)", subject, style),
                [(0, "First step"), (25, "Obstacle"), (70, "Reassessment")],
            ),
        ])
    }

    async fn generate_visuals(
        &self,
        paths: &[DecisionPath],
        style: TimelineStyle,
    ) -> Result<Vec<AssetRef>> {
        self.simulate(StepKind::CreatingVisuals).await?;
        Ok(paths
            .iter()
            .map(|p| AssetRef {
                path_id: p.id.clone(),
                uri: format!("simulated://assets/{}/{}.png", style, p.id),
            })
            .collect())
    }

    async fn render_video(&self, assets: &[AssetRef], style: TimelineStyle) -> Result<VideoRef> {
        self.simulate(StepKind::RenderingVideo).await?;
        Ok(VideoRef {
            uri: format!(
                "simulated://video/{}/{}-{}.mp4",
                style,
                Uuid::new_v4(),
                assets.len()
            ),
        })
    }

    async fn assemble_timeline(
        &self,
        text: &str,
        style: TimelineStyle,
        paths: Vec<DecisionPath>,
        video: Option<VideoRef>,
    ) -> Result<Timeline> {
        self.simulate(StepKind::AssemblingTimeline).await?;
        Ok(Timeline {
            id: Uuid::new_v4().to_string(),
            title: title_from_decision(text, TITLE_MAX_CHARS),
            decision_text: text.to_string(),
            style,
            duration: SIMULATED_TIMELINE_DURATION,
            paths,
            created_at: self.clock.now(),
            video_ref: video.map(|v| v.uri),
        })
    }
}
