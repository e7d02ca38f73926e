//! Composition root.
//!
//! `App` wires the clock, step registry, cache (with persistence and memory
//! monitor), provider and controller from configuration, and tears them down
//! in order.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{BlobStore, FileBlobStore, PersistenceHandle, TimelineCache};
use crate::config::{
    CONFIG_FILE_NAME, ENV_DATA_DIR, ENV_REMOTE_TOKEN, ENV_REMOTE_URL, FuturecastToml, env_value,
    resolve_remote_url,
};
use crate::periodic::PeriodicTask;
use crate::progress::{Clock, SystemClock};
use crate::provider::{InferenceProvider, SimulatedProvider};
use crate::session::GenerationController;
use crate::sync::{HttpRemoteStore, SyncReconciler};

/// Name of the project-local data directory.
pub const LOCAL_DATA_DIR: &str = ".futurecast";

/// Filesystem layout under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_file: data_dir.join(CONFIG_FILE_NAME),
            cache_dir: data_dir.join("cache"),
            log_dir: data_dir.join("logs"),
            data_dir,
        }
    }

    /// `--data-dir`, then `FUTURECAST_DATA_DIR`, then `./.futurecast` if present,
    /// then the user data directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let local = PathBuf::from(LOCAL_DATA_DIR);
        let local_exists = local.is_dir();
        Self::new(choose_data_dir(
            explicit,
            env_value(ENV_DATA_DIR).map(PathBuf::from),
            local_exists,
            dirs::data_local_dir(),
        ))
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.cache_dir, &self.log_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn load_config(&self) -> Result<FuturecastToml> {
        FuturecastToml::load_or_default(&self.data_dir)
    }
}

fn choose_data_dir(
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    local_exists: bool,
    user_data_dir: Option<PathBuf>,
) -> PathBuf {
    if let Some(dir) = explicit.or(env) {
        return dir;
    }
    if local_exists {
        return PathBuf::from(LOCAL_DATA_DIR);
    }
    user_data_dir
        .map(|dir| dir.join("futurecast"))
        .unwrap_or_else(|| PathBuf::from(LOCAL_DATA_DIR))
}

/// Running services for one process.
pub struct App {
    pub paths: AppPaths,
    pub config: FuturecastToml,
    pub clock: Arc<dyn Clock>,
    pub cache: TimelineCache,
    pub controller: GenerationController,
    persistence: Option<PersistenceHandle>,
    memory_monitor: Option<PeriodicTask>,
}

impl App {
    /// Start with the system clock and the simulated provider.
    pub async fn start(paths: AppPaths, config: FuturecastToml) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let provider =
            SimulatedProvider::new(clock.clone()).with_latency(config.provider_latency());
        Self::with_provider(paths, config, clock, Arc::new(provider)).await
    }

    pub async fn with_provider(
        paths: AppPaths,
        config: FuturecastToml,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn InferenceProvider>,
    ) -> Result<Self> {
        paths.ensure_directories()?;
        let registry = config.step_registry()?;

        let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(paths.cache_dir.clone()));
        let settings = config.cache_settings();
        let load_clock = clock.clone();
        let cache =
            tokio::task::spawn_blocking(move || TimelineCache::load(settings, load_clock, store))
                .await
                .context("Cache load task failed")?;

        let persistence = cache.spawn_persistence();
        let memory_monitor = cache.spawn_memory_monitor();
        let controller = GenerationController::new(
            provider,
            registry,
            clock.clone(),
            config.generation_settings(),
        )
        .with_cache(cache.clone());

        tracing::debug!("Data directory: {}", paths.data_dir.display());
        Ok(Self {
            paths,
            config,
            clock,
            cache,
            controller,
            persistence: Some(persistence),
            memory_monitor: Some(memory_monitor),
        })
    }

    /// Reconciler against the configured HTTP remote.
    ///
    /// `remote_url` overrides `FUTURECAST_REMOTE_URL` and `remote.base_url`.
    pub fn reconciler(&self, remote_url: Option<&str>) -> Result<SyncReconciler> {
        let url = resolve_remote_url(
            remote_url,
            env_value(ENV_REMOTE_URL).as_deref(),
            self.config.remote.base_url.as_deref(),
        )
        .context(
            "No remote configured. Set remote.base_url in futurecast.toml, \
             FUTURECAST_REMOTE_URL, or pass --remote-url",
        )?;
        let store = HttpRemoteStore::new(
            &url,
            self.config.remote_timeout(),
            env_value(ENV_REMOTE_TOKEN),
        )?;
        Ok(SyncReconciler::new(Arc::new(store), self.cache.clone()))
    }

    pub fn data_dir(&self) -> &Path {
        &self.paths.data_dir
    }

    /// Cancel sessions, stop the monitor and write the cache.
    pub async fn shutdown(mut self) -> Result<()> {
        self.controller.shutdown();
        if let Some(monitor) = self.memory_monitor.take() {
            monitor.stop();
        }
        let flushed = self.cache.flush().await;
        if let Some(persistence) = self.persistence.take() {
            persistence.shutdown().await;
        }
        flushed.context("Failed to save timeline cache")
    }
}
