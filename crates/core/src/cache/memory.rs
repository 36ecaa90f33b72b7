//! In-memory tier of the status cache.
//!
//! Empty at process start and filled lazily, either by writes or by
//! promotion of a fresh durable entry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::SiteStatus;

/// Cached status with the instant it entered the memory tier.
#[derive(Debug, Clone)]
struct MemoryEntry {
    status: SiteStatus,
    stored_at: Instant,
}

impl MemoryEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Volatile URL to status map in front of the durable store.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, MemoryEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status for `url` if it was stored less than `ttl` ago.
    pub fn get_fresh(&self, url: &str, ttl: Duration) -> Option<SiteStatus> {
        let entry = self.entries.get(url)?;
        if entry.is_fresh(ttl) {
            Some(entry.status.clone())
        } else {
            let age_ms = u64::try_from(entry.stored_at.elapsed().as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(url, age_ms, "memory entry stale");
            None
        }
    }

    /// Store `status`, resetting its age to now.
    pub fn insert(&mut self, url: &str, status: SiteStatus) {
        self.entries.insert(url.to_string(), MemoryEntry { status, stored_at: Instant::now() });
    }

    pub fn remove(&mut self, url: &str) {
        self.entries.remove(url);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
