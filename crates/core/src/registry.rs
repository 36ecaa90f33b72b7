//! Registry of monitored sites.
//!
//! The registry has no storage of its own: the keys of the persisted sites
//! map are the monitored sites, so adding a site means writing its pending
//! cache entry and removing it means clearing that entry.

use tracing::{info, warn};

use crate::cache::SiteCache;
use crate::status::now_ms;
use crate::{CacheEntry, Error, SiteStatus};

/// Add/remove/list operations over the monitored set.
#[derive(Clone, Debug)]
pub struct SiteRegistry {
    cache: SiteCache,
}

impl SiteRegistry {
    pub fn new(cache: SiteCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &SiteCache {
        &self.cache
    }

    /// Monitored sites in sorted order.
    pub async fn list(&self) -> Vec<String> {
        self.cache.sites().await.into_keys().collect()
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.cache.entry(url).await.is_some()
    }

    /// Register a site from raw user input and return its sanitized key.
    ///
    /// The site starts with a pending status whose TTL runs from now.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidInput` if the input is not a URL with a host
    /// - `Error::DuplicateSite` if the sanitized URL is already registered
    /// - `Error::Storage` if the new entry could not be persisted
    pub async fn add(&self, raw: &str) -> Result<String, Error> {
        let url = crate::url::sanitize(raw);
        crate::url::validate(&url).map_err(|e| Error::InvalidInput(format!("{raw}: {e}")))?;

        let ttl_ms = i64::try_from(self.cache.config().ttl.as_millis()).unwrap_or(i64::MAX);
        let entry = CacheEntry::new(SiteStatus::pending(), now_ms(), ttl_ms);
        let key = url.clone();

        self.cache
            .db()
            .update_sites(move |sites| {
                if sites.contains_key(&key) {
                    return Err(Error::DuplicateSite(key));
                }
                sites.insert(key, entry);
                Ok(())
            })
            .await
            .inspect_err(|e| {
                if !e.is_user_error() {
                    warn!(url = %url, error = %e, "failed to persist new site");
                }
            })?;

        info!(url = %url, "site added");
        Ok(url)
    }

    /// Stop monitoring `url`. Removing an unknown site is a no-op.
    pub async fn remove(&self, url: &str) {
        self.cache.clear(url).await;
        info!(url, "site removed");
    }
}
