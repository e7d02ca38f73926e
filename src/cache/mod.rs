//! Timeline cache.
//!
//! An in-memory, front-ordered working set of produced timelines with:
//! - insertion-order eviction above `max_size`
//! - TTL expiry by creation timestamp
//! - memory-pressure eviction down to half of `max_size`
//! - debounced background persistence to a `BlobStore`
//! - versioned export/import with recency-wins merging
//!
//! Reads are synchronous and never wait on persistence.

pub mod entry;
pub mod merge;
pub mod persist;
pub mod snapshot;
pub mod stats;
pub mod store;

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::errors::CacheError;
use crate::periodic::PeriodicTask;
use crate::progress::Clock;
use crate::timeline::{Timeline, TimelineStyle};

pub use entry::{CacheEntry, ENTRY_OVERHEAD_BYTES, PATH_OVERHEAD_BYTES, estimate_memory};
pub use merge::MergeReport;
pub use persist::PersistenceHandle;
pub use snapshot::{CacheSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use stats::CacheStatistics;
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore};

use persist::PersistSignal;

/// Blob key holding the persisted snapshot.
pub const CACHE_BLOB_KEY: &str = "timeline_cache";

pub const DEFAULT_MAX_SIZE: usize = 100;
pub const DEFAULT_TTL_DAYS: i64 = 7;
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MEMORY_CHECK_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSettings {
    pub max_size: usize,
    pub ttl: TimeDelta,
    pub memory_limit_bytes: u64,
    pub memory_check_interval: Duration,
    pub save_debounce: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl: TimeDelta::days(DEFAULT_TTL_DAYS),
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            memory_check_interval: DEFAULT_MEMORY_CHECK_INTERVAL,
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: Vec<CacheEntry>,
    last_updated: Option<DateTime<Utc>>,
}

pub(crate) struct CacheShared {
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    store: Arc<dyn BlobStore>,
    persist_tx: Mutex<Option<mpsc::UnboundedSender<PersistSignal>>>,
}

impl CacheShared {
    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<PersistSignal>> {
        self.persist_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn detach_persistence(&self) {
        self.persist_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// The timeline working set. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TimelineCache {
    pub(crate) shared: Arc<CacheShared>,
}

impl TimelineCache {
    /// Empty cache backed by `store`. Nothing is read from the store.
    pub fn new(settings: CacheSettings, clock: Arc<dyn Clock>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                state: RwLock::new(CacheState::default()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                settings,
                clock,
                store,
                persist_tx: Mutex::new(None),
            }),
        }
    }

    /// Cache seeded from the persisted snapshot in `store`.
    ///
    /// A missing, corrupt or version-mismatched snapshot yields an empty cache.
    /// Expired entries are dropped before the set becomes live.
    pub fn load(settings: CacheSettings, clock: Arc<dyn Clock>, store: Arc<dyn BlobStore>) -> Self {
        let cache = Self::new(settings, clock, store);
        let stored = cache.shared.store.get(CACHE_BLOB_KEY);
        let snapshot = match stored {
            Ok(Some(bytes)) => match CacheSnapshot::decode(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!("Ignoring persisted timeline cache: {}", e);
                    return cache;
                }
            },
            Ok(None) => {
                tracing::debug!("No persisted timeline cache found");
                return cache;
            }
            Err(e) => {
                tracing::warn!("Failed to read persisted timeline cache: {:#}", e);
                return cache;
            }
        };

        let cutoff = cache.expiry_cutoff();
        let total = snapshot.timelines.len();
        let mut entries: Vec<CacheEntry> = snapshot
            .timelines
            .into_iter()
            .filter(|t| cutoff.is_none_or(|cutoff| t.created_at >= cutoff))
            .map(CacheEntry::new)
            .collect();
        entries.truncate(settings.max_size);

        tracing::info!(
            "Loaded {} cached timeline(s), dropped {} expired",
            entries.len(),
            total.saturating_sub(entries.len())
        );
        {
            let mut state = cache.shared.write();
            state.entries = entries;
            state.last_updated = Some(snapshot.exported_at);
        }
        cache
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.shared.settings
    }

    /// Upsert by id at the front, evicting from the tail above `max_size`.
    pub fn cache_timeline(&self, timeline: Timeline) {
        let now = self.now();
        let max_size = self.shared.settings.max_size;
        let evicted = {
            let mut state = self.shared.write();
            state.entries.retain(|e| e.timeline.id != timeline.id);
            state.entries.insert(0, CacheEntry::new(timeline));
            let evicted = state.entries.len().saturating_sub(max_size);
            state.entries.truncate(max_size);
            state.last_updated = Some(now);
            evicted
        };
        if evicted > 0 {
            tracing::debug!("Evicted {} timeline(s) over the size cap", evicted);
        }
        self.mark_dirty();
    }

    pub fn remove_timeline(&self, id: &str) -> Option<Timeline> {
        let removed = {
            let mut state = self.shared.write();
            let index = state.entries.iter().position(|e| e.timeline.id == id)?;
            state.last_updated = Some(self.now());
            state.entries.remove(index).timeline
        };
        self.mark_dirty();
        Some(removed)
    }

    /// Look up a timeline, recording a hit or miss.
    pub fn get_timeline(&self, id: &str) -> Option<Timeline> {
        let found = self
            .shared
            .read()
            .entries
            .iter()
            .find(|e| e.timeline.id == id)
            .map(|e| e.timeline.clone());
        let counter = if found.is_some() {
            &self.shared.hits
        } else {
            &self.shared.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn contains(&self, id: &str) -> bool {
        self.shared
            .read()
            .entries
            .iter()
            .any(|e| e.timeline.id == id)
    }

    /// Case-insensitive substring match over title and decision text.
    pub fn search_timelines(&self, query: &str) -> Vec<Timeline> {
        let needle = query.trim().to_lowercase();
        self.collect(|t| t.matches_lowercase(&needle))
    }

    pub fn get_timelines_by_style(&self, style: TimelineStyle) -> Vec<Timeline> {
        self.collect(|t| t.style == style)
    }

    /// The `limit` most recently inserted timelines.
    pub fn get_recent_timelines(&self, limit: usize) -> Vec<Timeline> {
        self.shared
            .read()
            .entries
            .iter()
            .take(limit)
            .map(|e| e.timeline.clone())
            .collect()
    }

    pub fn all_timelines(&self) -> Vec<Timeline> {
        self.collect(|_| true)
    }

    pub fn len(&self) -> usize {
        self.shared.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear_cache(&self) {
        let now = self.now();
        let removed = {
            let mut state = self.shared.write();
            let removed = state.entries.len();
            state.entries.clear();
            state.last_updated = Some(now);
            removed
        };
        tracing::info!("Cleared {} cached timeline(s)", removed);

        // Through the worker so the delete is ordered after earlier saves
        let queued = self
            .shared
            .sender()
            .is_some_and(|tx| tx.send(PersistSignal::Clear).is_ok());
        if !queued && let Err(e) = self.remove_persisted() {
            tracing::warn!("Failed to remove timeline cache: {}", e);
        }
    }

    /// Remove entries created strictly before now minus the TTL.
    pub fn clear_expired_cache(&self) -> usize {
        let Some(cutoff) = self.expiry_cutoff() else {
            return 0;
        };
        let removed = {
            let mut state = self.shared.write();
            let before = state.entries.len();
            state.entries.retain(|e| e.timeline.created_at >= cutoff);
            let removed = before - state.entries.len();
            if removed > 0 {
                state.last_updated = Some(self.now());
            }
            removed
        };
        if removed > 0 {
            tracing::info!("Removed {} expired timeline(s)", removed);
            self.mark_dirty();
        }
        removed
    }

    /// Sum of entry memory estimates in bytes.
    pub fn memory_usage(&self) -> u64 {
        self.shared
            .read()
            .entries
            .iter()
            .map(|e| e.memory_size)
            .sum()
    }

    /// Evict down to `max_size / 2` entries when over the memory limit.
    pub fn check_memory_pressure(&self) -> usize {
        let settings = self.shared.settings;
        let (removed, usage) = {
            let mut state = self.shared.write();
            let usage: u64 = state.entries.iter().map(|e| e.memory_size).sum();
            if usage <= settings.memory_limit_bytes {
                return 0;
            }
            let target = settings.max_size / 2;
            let removed = state.entries.len().saturating_sub(target);
            state.entries.truncate(target);
            if removed > 0 {
                state.last_updated = Some(self.now());
            }
            (removed, usage)
        };
        if removed > 0 {
            tracing::warn!(
                "Cache memory usage {} bytes over limit {}, evicted {} timeline(s)",
                usage,
                settings.memory_limit_bytes,
                removed
            );
            self.mark_dirty();
        }
        removed
    }

    /// Run `check_memory_pressure` on the configured interval.
    pub fn spawn_memory_monitor(&self) -> PeriodicTask {
        let weak = Arc::downgrade(&self.shared);
        PeriodicTask::spawn(self.shared.settings.memory_check_interval, move || {
            match weak.upgrade() {
                Some(shared) => {
                    TimelineCache { shared }.check_memory_pressure();
                    ControlFlow::Continue(())
                }
                None => ControlFlow::Break(()),
            }
        })
    }

    pub fn export_snapshot(&self) -> CacheSnapshot {
        CacheSnapshot::new(self.all_timelines(), self.now())
    }

    /// Write the working set to `path` as pretty JSON. Returns the entry count.
    pub fn export_cache(&self, path: &Path) -> Result<usize, CacheError> {
        let snapshot = self.export_snapshot();
        snapshot.write_to(path)?;
        tracing::info!(
            "Exported {} timeline(s) to {}",
            snapshot.timelines.len(),
            path.display()
        );
        Ok(snapshot.timelines.len())
    }

    pub fn import_snapshot(&self, snapshot: CacheSnapshot) -> Result<MergeReport, CacheError> {
        if snapshot.version != SNAPSHOT_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                found: snapshot.version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        Ok(self.merge_timelines(snapshot.timelines))
    }

    /// Merge a previously exported file. A corrupt file leaves the cache untouched.
    pub fn import_cache(&self, path: &Path) -> Result<MergeReport, CacheError> {
        let snapshot = CacheSnapshot::read_from(path)?;
        let report = self.import_snapshot(snapshot)?;
        tracing::info!("Imported {}: {}", path.display(), report);
        Ok(report)
    }

    /// Recency-wins merge, then re-apply the size cap.
    pub fn merge_timelines(&self, incoming: Vec<Timeline>) -> MergeReport {
        let max_size = self.shared.settings.max_size;
        let report = {
            let mut state = self.shared.write();
            let report = merge::merge_into(&mut state.entries, incoming);
            state.entries.truncate(max_size);
            if report.changed() {
                state.last_updated = Some(self.now());
            }
            report
        };
        if report.changed() {
            self.mark_dirty();
        }
        report
    }

    pub fn get_cache_statistics(&self) -> CacheStatistics {
        let hits = self.shared.hits.load(Ordering::Relaxed);
        let misses = self.shared.misses.load(Ordering::Relaxed);
        let state = self.shared.read();
        CacheStatistics {
            entry_count: state.entries.len(),
            memory_usage_bytes: state.entries.iter().map(|e| e.memory_size).sum(),
            oldest_entry: state.entries.iter().map(|e| e.timeline.created_at).min(),
            newest_entry: state.entries.iter().map(|e| e.timeline.created_at).max(),
            last_updated: state.last_updated,
            hits,
            misses,
            hit_rate: stats::hit_rate(hits, misses),
        }
    }

    /// Start the debounced persistence worker. Must run inside a tokio runtime.
    pub fn spawn_persistence(&self) -> PersistenceHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .shared
            .persist_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        let task = tokio::spawn(persist::run(
            Arc::downgrade(&self.shared),
            rx,
            self.shared.settings.save_debounce,
        ));
        PersistenceHandle::new(self.shared.clone(), task)
    }

    /// Save immediately, through the worker when one is running.
    pub async fn flush(&self) -> Result<(), CacheError> {
        if let Some(tx) = self.shared.sender() {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.send(PersistSignal::Flush(ack_tx)).is_ok() {
                return match ack_rx.await {
                    Ok(result) => result.map_err(|e| CacheError::Store(anyhow::anyhow!(e))),
                    Err(_) => Err(CacheError::Store(anyhow::anyhow!(
                        "Persistence worker stopped before flushing"
                    ))),
                };
            }
        }

        let cache = self.clone();
        tokio::task::spawn_blocking(move || cache.save_now())
            .await
            .map_err(|e| CacheError::Store(anyhow::anyhow!("Cache save task failed: {}", e)))?
    }

    /// Encode and write the snapshot on the calling thread.
    ///
    /// An empty working set deletes the persisted blob instead.
    pub fn save_now(&self) -> Result<(), CacheError> {
        let snapshot = self.export_snapshot();
        if snapshot.timelines.is_empty() {
            return self.remove_persisted();
        }
        let bytes = snapshot.encode()?;
        self.shared
            .store
            .set(CACHE_BLOB_KEY, &bytes)
            .map_err(CacheError::Store)?;
        tracing::info!("Saved {} cached timeline(s)", snapshot.timelines.len());
        Ok(())
    }

    /// Delete the persisted snapshot on the calling thread.
    pub fn remove_persisted(&self) -> Result<(), CacheError> {
        self.shared
            .store
            .remove(CACHE_BLOB_KEY)
            .map_err(CacheError::Store)?;
        tracing::debug!("Removed persisted timeline cache");
        Ok(())
    }

    fn collect(&self, keep: impl Fn(&Timeline) -> bool) -> Vec<Timeline> {
        self.shared
            .read()
            .entries
            .iter()
            .filter(|e| keep(&e.timeline))
            .map(|e| e.timeline.clone())
            .collect()
    }

    fn now(&self) -> DateTime<Utc> {
        self.shared.clock.now()
    }

    fn expiry_cutoff(&self) -> Option<DateTime<Utc>> {
        self.now().checked_sub_signed(self.shared.settings.ttl)
    }

    fn mark_dirty(&self) {
        if let Some(tx) = self.shared.sender() {
            let _ = tx.send(PersistSignal::Dirty);
        }
    }
}
