//! Timeline artifacts produced by a successful generation session.
//!
//! A `Timeline` is immutable once assembled. The cache stores it as-is and
//! only derives bookkeeping (memory estimates) from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Allowed drift of path probabilities away from 1.0 before it is logged.
pub const PROBABILITY_TOLERANCE: f64 = 0.01;

/// Visual style requested for a generated timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineStyle {
    #[default]
    Realistic,
    Optimistic,
    Cinematic,
    Documentary,
}

impl TimelineStyle {
    pub const ALL: [TimelineStyle; 4] = [
        TimelineStyle::Realistic,
        TimelineStyle::Optimistic,
        TimelineStyle::Cinematic,
        TimelineStyle::Documentary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineStyle::Realistic => "realistic",
            TimelineStyle::Optimistic => "optimistic",
            TimelineStyle::Cinematic => "cinematic",
            TimelineStyle::Documentary => "documentary",
        }
    }
}

impl std::fmt::Display for TimelineStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimelineStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "realistic" => Ok(TimelineStyle::Realistic),
            "optimistic" => Ok(TimelineStyle::Optimistic),
            "cinematic" => Ok(TimelineStyle::Cinematic),
            "documentary" => Ok(TimelineStyle::Documentary),
            _ => anyhow::bail!(
                "Invalid timeline style '{}'. Valid values: realistic, optimistic, cinematic, documentary",
                s
            ),
        }
    }
}

/// Emotional tone of a decision path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalIndicator {
    Success,
    Challenge,
    Neutral,
    Growth,
}

impl std::fmt::Display for EmotionalIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmotionalIndicator::Success => write!(f, "success"),
            EmotionalIndicator::Challenge => write!(f, "challenge"),
            EmotionalIndicator::Neutral => write!(f, "neutral"),
            EmotionalIndicator::Growth => write!(f, "growth"),
        }
    }
}

/// A notable event along a decision path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMoment {
    /// Offset from the start of the timeline
    #[serde(with = "duration_serde")]
    pub offset: Duration,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl KeyMoment {
    pub fn new(offset: Duration, title: &str, description: &str) -> Self {
        Self {
            offset,
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// One possible outcome of a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPath {
    pub id: String,
    pub title: String,
    /// Likelihood of this path, 0.0 to 1.0
    pub probability: f64,
    pub outcome: String,
    pub emotional_indicator: EmotionalIndicator,
    #[serde(default)]
    pub key_moments: Vec<KeyMoment>,
}

/// The artifact produced by one successful generation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: String,
    pub title: String,
    pub decision_text: String,
    pub style: TimelineStyle,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub paths: Vec<DecisionPath>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_ref: Option<String>,
}

impl Timeline {
    /// Sum of all path probabilities.
    pub fn probability_total(&self) -> f64 {
        self.paths.iter().map(|p| p.probability).sum()
    }

    /// Whether path probabilities sum to 1.0 within [`PROBABILITY_TOLERANCE`].
    pub fn has_balanced_probabilities(&self) -> bool {
        (self.probability_total() - 1.0).abs() <= PROBABILITY_TOLERANCE
    }

    /// Case-insensitive substring match against title and decision text.
    /// `needle` must already be lowercase.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.decision_text.to_lowercase().contains(needle)
    }
}

/// Build a short display title from free-form decision text.
pub fn title_from_decision(decision: &str, max_chars: usize) -> String {
    let trimmed = decision.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

/// Serialize `Duration` as integer milliseconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).map_err(serde::ser::Error::custom)?;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A two-path timeline for cache and sync tests.
    pub fn timeline(id: &str, title: &str, created_at: DateTime<Utc>) -> Timeline {
        Timeline {
            id: id.to_string(),
            title: title.to_string(),
            decision_text: format!("Decision behind {}", title),
            style: TimelineStyle::Realistic,
            duration: Duration::from_secs(90),
            paths: vec![
                DecisionPath {
                    id: format!("{}-a", id),
                    title: "Stay".to_string(),
                    probability: 0.5,
                    outcome: "Things stay familiar".to_string(),
                    emotional_indicator: EmotionalIndicator::Neutral,
                    key_moments: vec![KeyMoment::new(Duration::from_secs(10), "Start", "")],
                },
                DecisionPath {
                    id: format!("{}-b", id),
                    title: "Go".to_string(),
                    probability: 0.5,
                    outcome: "Things change".to_string(),
                    emotional_indicator: EmotionalIndicator::Growth,
                    key_moments: Vec::new(),
                },
            ],
            created_at,
            video_ref: None,
        }
    }
}
