//! Two-tier site status cache.
//!
//! Reads prefer the memory tier, fall back to the durable store and promote
//! fresh durable hits. Writes always go to both tiers. Storage failures are
//! logged and treated as a cache miss: a missing status is a state every
//! caller already handles by probing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connection::CacheDb;
use super::memory::MemoryCache;
use super::sites::SitesData;
use crate::status::now_ms;
use crate::{CacheEntry, SiteStatus};

/// Cache timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of a persisted entry.
    pub ttl: Duration,
    /// Lifetime of a memory-tier entry.
    pub memory_ttl: Duration,
    /// Entries with less than this left are reported by the expiry scan.
    pub expiry_margin: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            memory_ttl: Duration::from_secs(30),
            expiry_margin: Duration::from_secs(5),
        }
    }
}

/// Sites whose cache entries are expired or about to expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryNotice {
    pub urls: Vec<String>,
}

/// Receiving end of the expiry notice channel.
pub type ExpiryReceiver = mpsc::UnboundedReceiver<ExpiryNotice>;

/// Handle to the background expiry scan. The scan stops when this is dropped.
#[derive(Debug)]
pub struct CleanupTask {
    handle: JoinHandle<()>,
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Owned two-tier cache. Cloning shares the underlying tiers.
#[derive(Clone, Debug)]
pub struct SiteCache {
    db: CacheDb,
    memory: Arc<RwLock<MemoryCache>>,
    config: CacheConfig,
    notices: mpsc::UnboundedSender<ExpiryNotice>,
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl SiteCache {
    /// Create a cache over `db` together with the receiver of its expiry
    /// notices.
    pub fn new(db: CacheDb, config: CacheConfig) -> (Self, ExpiryReceiver) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let cache = Self { db, memory: Arc::new(RwLock::new(MemoryCache::new())), config, notices };
        (cache, receiver)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Cached status for `url`, or `None` when it needs probing.
    pub async fn get(&self, url: &str) -> Option<SiteStatus> {
        if let Some(status) = self.memory.read().await.get_fresh(url, self.config.memory_ttl) {
            debug!(url, "memory cache hit");
            return Some(status);
        }

        let entry = self.entry(url).await?;
        if !entry.is_valid(now_ms()) {
            debug!(url, "durable entry expired");
            return None;
        }

        debug!(url, "durable cache hit, promoting");
        self.memory.write().await.insert(url, entry.data.clone());
        Some(entry.data)
    }

    /// Durable entry for `url`, bypassing the memory tier.
    pub async fn entry(&self, url: &str) -> Option<CacheEntry> {
        match self.db.load_sites().await {
            Ok(mut sites) => sites.remove(url),
            Err(e) => {
                warn!(url, error = %e, "failed to read durable cache");
                None
            }
        }
    }

    /// All durable entries. Empty if the store cannot be read.
    pub async fn sites(&self) -> SitesData {
        self.db.load_sites().await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to read durable cache");
            SitesData::new()
        })
    }

    /// Store `status` for `url` in both tiers, restarting its TTL.
    pub async fn set(&self, url: &str, status: &SiteStatus) {
        let status = status.normalized();
        let entry = CacheEntry::new(status.clone(), now_ms(), millis(self.config.ttl));

        self.memory.write().await.insert(url, status);

        let key = url.to_string();
        if let Err(e) = self
            .db
            .update_sites(move |sites| {
                sites.insert(key, entry);
                Ok(())
            })
            .await
        {
            warn!(url, error = %e, "failed to persist status");
        }
    }

    /// Like [`SiteCache::set`], but only for a site that is still registered.
    ///
    /// Returns `false` without writing when `url` has no durable entry, so a
    /// probe that finishes after its site was removed cannot re-register it.
    pub async fn replace(&self, url: &str, status: &SiteStatus) -> bool {
        let status = status.normalized();
        let entry = CacheEntry::new(status.clone(), now_ms(), millis(self.config.ttl));

        // Held across the durable update so a concurrent `clear` cannot land
        // between the commit and the memory insert.
        let mut memory = self.memory.write().await;
        let key = url.to_string();
        let stored = self
            .db
            .update_sites(move |sites| {
                if !sites.contains_key(&key) {
                    return Ok(false);
                }
                sites.insert(key, entry);
                Ok(true)
            })
            .await
            .unwrap_or_else(|e| {
                warn!(url, error = %e, "failed to persist status");
                false
            });

        if stored {
            memory.insert(url, status);
        } else {
            debug!(url, "site no longer registered, status dropped");
        }
        stored
    }

    /// Remove `url` from both tiers. This un-registers the site.
    pub async fn clear(&self, url: &str) {
        let key = url.to_string();
        if let Err(e) = self
            .db
            .update_sites(move |sites| {
                sites.remove(&key);
                Ok(())
            })
            .await
        {
            warn!(url, error = %e, "failed to remove durable entry");
        }

        self.memory.write().await.remove(url);
    }

    /// Empty both tiers.
    pub async fn clear_all(&self) {
        if let Err(e) = self.db.save_sites(SitesData::new()).await {
            warn!(error = %e, "failed to clear durable cache");
        }
        self.memory.write().await.clear();
    }

    /// Whether `entry` has both timing fields and has not expired.
    pub fn is_valid(entry: &CacheEntry) -> bool {
        entry.is_valid(now_ms())
    }

    /// Scan durable entries and report those that need refreshing.
    ///
    /// An entry needs refreshing when a timing field is missing or less than
    /// the expiry margin remains. A single [`ExpiryNotice`] is sent when the
    /// set is non-empty; the refresh itself is left to the receiver.
    pub async fn cleanup(&self) -> Vec<String> {
        let sites = match self.db.load_sites().await {
            Ok(sites) => sites,
            Err(e) => {
                warn!(error = %e, "cache cleanup could not read durable cache");
                return Vec::new();
            }
        };

        let now = now_ms();
        let margin = millis(self.config.expiry_margin);
        let expiring: Vec<String> = sites
            .into_iter()
            .filter(|(_, entry)| {
                entry.timestamp.is_none() || entry.remaining_ms(now).is_none_or(|remaining| remaining < margin)
            })
            .map(|(url, _)| url)
            .collect();

        if expiring.is_empty() {
            debug!("cache cleanup: nothing expiring");
            return expiring;
        }

        info!(count = expiring.len(), "cache cleanup: entries expiring");
        if self.notices.send(ExpiryNotice { urls: expiring.clone() }).is_err() {
            debug!("no expiry notice receiver");
        }
        expiring
    }

    /// Run [`SiteCache::cleanup`] on its own timer until the returned
    /// [`CleanupTask`] is dropped.
    pub fn spawn_cleanup(&self, period: Duration) -> CleanupTask {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; the first scan waits a full period.
            interval.tick().await;

            loop {
                interval.tick().await;
                cache.cleanup().await;
            }
        });
        CleanupTask { handle }
    }

    #[cfg(test)]
    pub(crate) async fn memory_len(&self) -> usize {
        self.memory.read().await.len()
    }
}
