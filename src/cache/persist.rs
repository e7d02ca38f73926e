//! Debounced background persistence for the timeline cache.
//!
//! Mutations send `Dirty`; the worker saves once no signal has arrived for the
//! debounce period. `Flush` saves immediately and acknowledges. `Clear`
//! deletes the persisted blob and drops any pending save. Store calls run on
//! a blocking thread.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{CacheShared, TimelineCache};
use crate::errors::CacheError;

pub(crate) enum PersistSignal {
    Dirty,
    Clear,
    Flush(oneshot::Sender<Result<(), String>>),
}

pub(crate) async fn run(
    cache: Weak<CacheShared>,
    mut rx: mpsc::UnboundedReceiver<PersistSignal>,
    debounce: Duration,
) {
    let mut pending = false;
    loop {
        let signal = if pending {
            tokio::select! {
                signal = rx.recv() => signal,
                _ = tokio::time::sleep(debounce) => {
                    let _ = save(&cache).await;
                    pending = false;
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match signal {
            Some(PersistSignal::Dirty) => pending = true,
            Some(PersistSignal::Clear) => {
                let _ = remove(&cache).await;
                pending = false;
            }
            Some(PersistSignal::Flush(ack)) => {
                let result = save(&cache).await;
                pending = false;
                let _ = ack.send(result);
            }
            None => {
                if pending {
                    let _ = save(&cache).await;
                }
                break;
            }
        }
    }
    tracing::debug!("Cache persistence worker stopped");
}

async fn save(cache: &Weak<CacheShared>) -> Result<(), String> {
    on_blocking_thread(cache, "persist", TimelineCache::save_now).await
}

async fn remove(cache: &Weak<CacheShared>) -> Result<(), String> {
    on_blocking_thread(cache, "remove", TimelineCache::remove_persisted).await
}

async fn on_blocking_thread(
    cache: &Weak<CacheShared>,
    action: &'static str,
    op: fn(&TimelineCache) -> Result<(), CacheError>,
) -> Result<(), String> {
    let Some(shared) = cache.upgrade() else {
        return Ok(());
    };
    let cache = TimelineCache { shared };
    let result = match tokio::task::spawn_blocking(move || op(&cache)).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("Cache {} task failed: {}", action, e)),
    };
    if let Err(e) = &result {
        tracing::warn!("Failed to {} timeline cache: {}", action, e);
    }
    result
}

/// Running persistence worker.
///
/// `shutdown` closes the signal channel, writes any pending change and waits
/// for the worker to exit.
pub struct PersistenceHandle {
    shared: Arc<CacheShared>,
    task: JoinHandle<()>,
}

impl PersistenceHandle {
    pub(crate) fn new(shared: Arc<CacheShared>, task: JoinHandle<()>) -> Self {
        Self { shared, task }
    }

    pub async fn shutdown(self) {
        self.shared.detach_persistence();
        if let Err(e) = self.task.await {
            tracing::warn!("Cache persistence worker panicked: {}", e);
        }
    }
}
