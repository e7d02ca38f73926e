//! Reconciliation of the local timeline cache with a remote store.
//!
//! Remote timelines are merged with the same recency-wins rule as import.
//! Local-only timelines are never deleted, and a failed fetch leaves the
//! cache untouched.

pub mod http;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::cache::{MergeReport, TimelineCache};
use crate::errors::SyncError;
use crate::timeline::Timeline;

pub use http::HttpRemoteStore;
pub use memory::InMemoryRemoteStore;

/// Abstraction over the remote timeline database for testability.
/// Real implementation: `HttpRemoteStore`. Test double: `InMemoryRemoteStore`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_timelines(&self, user_id: &str) -> Result<Vec<Timeline>>;
}

pub struct SyncReconciler {
    remote: Arc<dyn RemoteStore>,
    cache: TimelineCache,
}

impl SyncReconciler {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: TimelineCache) -> Self {
        Self { remote, cache }
    }

    pub async fn sync_with_remote(&self, user_id: &str) -> Result<MergeReport, SyncError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SyncError::InvalidUser);
        }

        let remote = match self.remote.fetch_timelines(user_id).await {
            Ok(timelines) => timelines,
            Err(source) => {
                tracing::warn!(user = user_id, "Timeline sync failed: {:#}", source);
                return Err(SyncError::Fetch {
                    user_id: user_id.to_string(),
                    source,
                });
            }
        };

        let fetched = remote.len();
        let report = self.cache.merge_timelines(remote);
        tracing::info!(
            user = user_id,
            fetched,
            "Timeline sync complete: {}",
            report
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, MemoryBlobStore};
    use crate::progress::ManualClock;
    use crate::timeline::fixtures;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap()
    }

    fn cache() -> TimelineCache {
        TimelineCache::new(
            CacheSettings::default(),
            Arc::new(ManualClock::new(start())),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    #[tokio::test]
    async fn test_sync_merges_recency_wins_and_keeps_local_only() {
        let cache = cache();
        cache.cache_timeline(fixtures::timeline("shared-old", "local", start()));
        cache.cache_timeline(fixtures::timeline("shared-new", "local", start()));
        cache.cache_timeline(fixtures::timeline("local-only", "local", start()));

        let remote = InMemoryRemoteStore::new().with_timelines(
            "u-1",
            vec![
                fixtures::timeline("shared-old", "remote", start() + TimeDelta::hours(2)),
                fixtures::timeline("shared-new", "remote", start() - TimeDelta::hours(2)),
                fixtures::timeline("remote-only", "remote", start()),
            ],
        );
        let reconciler = SyncReconciler::new(Arc::new(remote), cache.clone());

        let report = reconciler.sync_with_remote("u-1").await.unwrap();

        assert_eq!(
            report,
            MergeReport {
                added: 1,
                replaced: 1,
                kept_local: 1
            }
        );
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.get_timeline("shared-old").unwrap().title, "remote");
        assert_eq!(cache.get_timeline("shared-new").unwrap().title, "local");
        assert!(cache.contains("local-only"));
        assert_eq!(cache.get_recent_timelines(1)[0].id, "remote-only");
    }

    #[tokio::test]
    async fn test_sync_failure_leaves_cache_untouched() {
        let cache = cache();
        cache.cache_timeline(fixtures::timeline("a", "local", start()));
        let remote = InMemoryRemoteStore::new();
        remote.set_failing(true);
        let reconciler = SyncReconciler::new(Arc::new(remote), cache.clone());

        let err = reconciler.sync_with_remote("u-1").await.unwrap_err();

        assert!(matches!(err, SyncError::Fetch { ref user_id, .. } if user_id == "u-1"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get_timeline("a").is_some());
    }

    #[tokio::test]
    async fn test_sync_rejects_empty_user() {
        let reconciler = SyncReconciler::new(Arc::new(InMemoryRemoteStore::new()), cache());
        assert!(matches!(
            reconciler.sync_with_remote("  ").await,
            Err(SyncError::InvalidUser)
        ));
    }
}
