//! Site status snapshots and cache entries.
//!
//! All instants are milliseconds since the Unix epoch, which is also the
//! representation used in the persisted JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Format an epoch-millisecond instant as a short local date and time.
///
/// Returns `"-"` for instants chrono cannot represent.
pub fn format_timestamp(ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.with_timezone(&chrono::Local).format("%d/%m/%Y %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// CDN/WAF/server signatures detected in response headers.
///
/// Each flag is derived independently; several can be set at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Protections {
    pub cloudflare: bool,
    pub akamai: bool,
    pub varnish: bool,
    pub nginx: bool,
    pub apache: bool,
}

impl Protections {
    /// Names of the flags that are set, in declaration order.
    pub fn detected(&self) -> Vec<&'static str> {
        [
            ("cloudflare", self.cloudflare),
            ("akamai", self.akamai),
            ("varnish", self.varnish),
            ("nginx", self.nginx),
            ("apache", self.apache),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

/// Immutable snapshot of one reachability check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteStatus {
    /// `None` while the first check is pending.
    pub online: Option<bool>,
    /// Response time in milliseconds; `None` when offline or unknown.
    pub avg_response: Option<u64>,
    /// Response headers with lower-cased names.
    pub headers: Option<BTreeMap<String, String>>,
    /// Whether the successful attempt used https.
    pub ssl: bool,
    pub status_code: Option<u16>,
    /// Time of the check.
    pub timestamp: i64,
    pub protections: Protections,
}

impl SiteStatus {
    /// Placeholder for a site that has not been checked yet.
    pub fn pending() -> Self {
        Self { timestamp: now_ms(), ..Default::default() }
    }

    /// The canonical status for a site that could not be reached.
    pub fn offline() -> Self {
        Self { online: Some(false), timestamp: now_ms(), ..Default::default() }
    }

    pub fn is_pending(&self) -> bool {
        self.online.is_none()
    }

    /// Copy of this status as it is stored: latency only survives for
    /// sites that are online.
    pub fn normalized(&self) -> Self {
        let mut status = self.clone();
        if status.online != Some(true) {
            status.avg_response = None;
        }
        status
    }

    /// Human readable state label.
    pub fn label(&self) -> &'static str {
        match self.online {
            None => "pending",
            Some(true) => "online",
            Some(false) => "offline",
        }
    }
}

/// Persisted cache record for one monitored site.
///
/// Entries written by this crate always carry both timing fields. They are
/// optional so that damaged or foreign entries still load and are treated
/// as invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    #[serde(default)]
    pub data: SiteStatus,
    /// Write time.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Write time plus the cache TTL.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl CacheEntry {
    /// Wrap a status written at `now` that expires after `ttl_ms`.
    pub fn new(data: SiteStatus, now: i64, ttl_ms: i64) -> Self {
        Self { data, timestamp: Some(now), expires_at: Some(now + ttl_ms) }
    }

    /// An entry is valid iff both timing fields are set and it has not expired.
    pub fn is_valid(&self, now: i64) -> bool {
        self.timestamp.is_some() && self.is_fresh(now)
    }

    /// Fresh iff `now < expires_at`.
    pub fn is_fresh(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| now < expires_at)
    }

    /// Milliseconds left before expiry, `None` if the entry has no expiry.
    pub fn remaining_ms(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|expires_at| expires_at - now)
    }
}
