//! Configuration for futurecast.
//!
//! Settings are read from `futurecast.toml` in the data directory:
//!
//! ```toml
//! [generation]
//! tick_interval_ms = 100
//! smoothing = 0.3
//!
//! [steps.rendering_video]
//! weight = 0.85
//! duration_secs = 12
//!
//! [cache]
//! max_size = 100
//! ttl_days = 7
//! memory_limit_mb = 100
//! memory_check_secs = 5
//! save_debounce_ms = 2000
//!
//! [provider]
//! latency_ms = 150
//!
//! [remote]
//! base_url = "https://api.example.com"
//! timeout_secs = 10
//! ```
//!
//! Layering is file → environment (`FUTURECAST_REMOTE_URL`,
//! `FUTURECAST_REMOTE_TOKEN`) → CLI flags.

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheSettings;
use crate::progress::DEFAULT_SMOOTHING;
use crate::session::GenerationSettings;
use crate::step::{StepKind, StepRegistry, reference_steps};

pub const CONFIG_FILE_NAME: &str = "futurecast.toml";
pub const ENV_REMOTE_URL: &str = "FUTURECAST_REMOTE_URL";
pub const ENV_REMOTE_TOKEN: &str = "FUTURECAST_REMOTE_TOKEN";
pub const ENV_DATA_DIR: &str = "FUTURECAST_DATA_DIR";

/// `[generation]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Progress tick interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Pull of the current step weight on the estimate, in (0, 1]
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_smoothing() -> f64 {
    DEFAULT_SMOOTHING
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            smoothing: default_smoothing(),
        }
    }
}

/// `[steps.<kind>]` override. Unset fields keep the reference value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "default_memory_check_secs")]
    pub memory_check_secs: u64,
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
}

fn default_max_size() -> usize {
    100
}

fn default_ttl_days() -> i64 {
    7
}

fn default_memory_limit_mb() -> u64 {
    100
}

fn default_memory_check_secs() -> u64 {
    5
}

fn default_save_debounce_ms() -> u64 {
    2000
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            ttl_days: default_ttl_days(),
            memory_limit_mb: default_memory_limit_mb(),
            memory_check_secs: default_memory_check_secs(),
            save_debounce_ms: default_save_debounce_ms(),
        }
    }
}

/// `[provider]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Simulated latency per provider call
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
}

fn default_latency_ms() -> u64 {
    150
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
        }
    }
}

/// `[remote]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// The complete futurecast.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuturecastToml {
    #[serde(default)]
    pub generation: GenerationSection,
    /// Per-step overrides keyed by step key (e.g. `rendering_video`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub steps: BTreeMap<String, StepOverride>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub remote: RemoteSection,
}

impl FuturecastToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse futurecast.toml")
    }

    /// Load `futurecast.toml` from `data_dir`, or defaults when it is absent.
    pub fn load_or_default(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize futurecast.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Reference steps with `[steps.*]` overrides applied, validated.
    pub fn step_registry(&self) -> Result<StepRegistry> {
        let steps = reference_steps()
            .into_iter()
            .map(|mut step| {
                if let Some(over) = self.steps.get(step.kind.key()) {
                    if let Some(weight) = over.weight {
                        step.weight = weight;
                    }
                    if let Some(secs) = over.duration_secs {
                        step.nominal_duration = Duration::from_secs(secs);
                    }
                }
                step
            })
            .collect();
        StepRegistry::new(steps).context("Invalid [steps] configuration")
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            tick_interval: Duration::from_millis(self.generation.tick_interval_ms.max(1)),
            smoothing: self.generation.smoothing,
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_size: self.cache.max_size,
            ttl: TimeDelta::days(self.cache.ttl_days),
            memory_limit_bytes: self.cache.memory_limit_mb.saturating_mul(1024 * 1024),
            memory_check_interval: Duration::from_secs(self.cache.memory_check_secs.max(1)),
            save_debounce: Duration::from_millis(self.cache.save_debounce_ms),
        }
    }

    pub fn provider_latency(&self) -> Duration {
        Duration::from_millis(self.provider.latency_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs.max(1))
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.generation.tick_interval_ms == 0 {
            warnings.push("generation.tick_interval_ms is 0; using 1ms".to_string());
        }
        let smoothing = self.generation.smoothing;
        if !(smoothing > 0.0 && smoothing <= 1.0) {
            warnings.push(format!(
                "generation.smoothing {} should be greater than 0 and at most 1",
                smoothing
            ));
        }

        for key in self.steps.keys() {
            if key.parse::<StepKind>().is_err() {
                warnings.push(format!(
                    "Unknown step '{}' in [steps]. Valid values: {}",
                    key,
                    StepKind::ALL.map(|k| k.key()).join(", ")
                ));
            }
        }
        if let Err(e) = self.step_registry() {
            warnings.push(format!("{:#}", e));
        }

        if self.cache.max_size == 0 {
            warnings.push("cache.max_size is 0; nothing will be cached".to_string());
        }
        if self.cache.ttl_days <= 0 {
            warnings.push(format!(
                "cache.ttl_days {} expires every timeline immediately",
                self.cache.ttl_days
            ));
        }
        if self.cache.memory_limit_mb == 0 {
            warnings.push(
                "cache.memory_limit_mb is 0; memory checks evict on every run".to_string(),
            );
        }

        if let Some(url) = &self.remote.base_url
            && reqwest::Url::parse(url).is_err()
        {
            warnings.push(format!("remote.base_url '{}' is not a valid URL", url));
        }

        warnings
    }
}

/// Pick the remote base URL: CLI flag, then environment, then file.
pub fn resolve_remote_url(
    cli: Option<&str>,
    env: Option<&str>,
    file: Option<&str>,
) -> Option<String> {
    [cli, env, file]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

/// Non-empty value of an environment variable.
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FuturecastToml::parse("").unwrap();
        assert_eq!(config, FuturecastToml::default());
        assert_eq!(config.generation.tick_interval_ms, 100);
        assert_eq!(config.generation.smoothing, 0.3);
        assert_eq!(config.cache.max_size, 100);
        assert_eq!(config.cache.ttl_days, 7);
        assert_eq!(config.cache_settings(), CacheSettings::default());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
[generation]
tick_interval_ms = 250
smoothing = 0.5

[steps.rendering_video]
duration_secs = 20

[cache]
max_size = 10
ttl_days = 1
memory_limit_mb = 8
memory_check_secs = 30
save_debounce_ms = 500

[provider]
latency_ms = 0

[remote]
base_url = "https://api.example.com"
timeout_secs = 3
"#;
        let config = FuturecastToml::parse(content).unwrap();

        let generation = config.generation_settings();
        assert_eq!(generation.tick_interval, Duration::from_millis(250));
        assert_eq!(generation.smoothing, 0.5);

        let cache = config.cache_settings();
        assert_eq!(cache.max_size, 10);
        assert_eq!(cache.ttl, TimeDelta::days(1));
        assert_eq!(cache.memory_limit_bytes, 8 * 1024 * 1024);
        assert_eq!(cache.memory_check_interval, Duration::from_secs(30));
        assert_eq!(cache.save_debounce, Duration::from_millis(500));

        assert_eq!(config.provider_latency(), Duration::ZERO);
        assert_eq!(config.remote_timeout(), Duration::from_secs(3));

        let registry = config.step_registry().unwrap();
        assert_eq!(
            registry.get(StepKind::RenderingVideo).nominal_duration,
            Duration::from_secs(20)
        );
        assert_eq!(registry.total_duration(), Duration::from_secs(53));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_invalid_step_weights_are_reported() {
        let content = r#"
[steps.processing_context]
weight = 0.5
"#;
        let config = FuturecastToml::parse(content).unwrap();
        assert!(config.step_registry().is_err());

        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("generating_perspectives"));
    }

    #[test]
    fn test_unknown_step_and_bad_values_warn() {
        let content = r#"
[generation]
smoothing = 0.0

[steps.dreaming]
weight = 0.5

[cache]
max_size = 0

[remote]
base_url = "not a url"
"#;
        let config = FuturecastToml::parse(content).unwrap();
        let warnings = config.validate();

        assert!(warnings.iter().any(|w| w.contains("smoothing")));
        assert!(warnings.iter().any(|w| w.contains("Unknown step 'dreaming'")));
        assert!(warnings.iter().any(|w| w.contains("max_size")));
        assert!(warnings.iter().any(|w| w.contains("not a valid URL")));
        // Unknown keys do not break the registry
        assert!(config.step_registry().is_ok());
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let err = FuturecastToml::parse("[cache]\nmax_size = \"lots\"").unwrap_err();
        assert!(err.to_string().contains("futurecast.toml"));
    }

    #[test]
    fn test_save_and_load_or_default() {
        let dir = tempdir().unwrap();
        assert_eq!(
            FuturecastToml::load_or_default(dir.path()).unwrap(),
            FuturecastToml::default()
        );

        let mut config = FuturecastToml::default();
        config.provider.latency_ms = 5;
        config.steps.insert(
            "creating_visuals".to_string(),
            StepOverride {
                weight: None,
                duration_secs: Some(4),
            },
        );
        config.save(&dir.path().join(CONFIG_FILE_NAME)).unwrap();

        let loaded = FuturecastToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_resolve_remote_url_priority() {
        assert_eq!(
            resolve_remote_url(Some("https://cli"), Some("https://env"), Some("https://file")),
            Some("https://cli".to_string())
        );
        assert_eq!(
            resolve_remote_url(None, Some("https://env"), Some("https://file")),
            Some("https://env".to_string())
        );
        assert_eq!(
            resolve_remote_url(Some("  "), None, Some("https://file")),
            Some("https://file".to_string())
        );
        assert_eq!(resolve_remote_url(None, None, None), None);
    }
}
