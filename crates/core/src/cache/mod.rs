//! Two-tier status cache for monitored sites.
//!
//! The durable tier is a SQLite database accessed via tokio-rusqlite that
//! holds one JSON map from sanitized URL to [`CacheEntry`]. The memory tier
//! is a volatile accelerator in front of it. It supports:
//!
//! - Per-entry expiry with transparent promotion into the memory tier
//! - Atomic read-modify-write of the persisted map
//! - Automatic schema migrations
//! - An expiry scan that emits [`ExpiryNotice`]s instead of refreshing
//!
//! [`CacheEntry`]: crate::CacheEntry

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod site_cache;
pub mod sites;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryCache;
pub use site_cache::{CacheConfig, CleanupTask, ExpiryNotice, ExpiryReceiver, SiteCache};
pub use sites::{SITES_DATA_KEY, SitesData};
