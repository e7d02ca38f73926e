use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::RemoteStore;
use crate::timeline::Timeline;

/// Remote store held in memory, with an optional failure mode.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    timelines: Mutex<HashMap<String, Vec<Timeline>>>,
    failing: AtomicBool,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timelines(self, user_id: &str, timelines: Vec<Timeline>) -> Self {
        self.put(user_id, timelines);
        self
    }

    pub fn put(&self, user_id: &str, timelines: Vec<Timeline>) {
        self.timelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), timelines);
    }

    /// Make every fetch fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn fetch_timelines(&self, user_id: &str) -> Result<Vec<Timeline>> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("remote store unavailable");
        }
        Ok(self
            .timelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
