//! Core types and shared functionality for sitewatch.
//!
//! This crate provides:
//! - Site status and cache entry types
//! - Two-tier status cache (memory + SQLite) with expiry notices
//! - Registry of monitored sites
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod status;
pub mod url;

pub use cache::{CacheConfig, CacheDb, CleanupTask, ExpiryNotice, ExpiryReceiver, SiteCache, SitesData};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use registry::SiteRegistry;
pub use status::{CacheEntry, Protections, SiteStatus};
