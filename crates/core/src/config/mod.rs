//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SITEWATCH_*)
//! 2. TOML config file (if SITEWATCH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;

mod validation;

pub use validation::ConfigError;

/// Well-known platforms that commonly block cross-origin introspection.
pub const DEFAULT_MAJOR_SITES: &[&str] = &[
    "google.",
    "facebook.",
    "microsoft.",
    "apple.",
    "amazon.",
    "youtube.",
    "twitter.",
    "instagram.",
    "cloudflare.",
    "github.",
    "gitlab.",
    "netlify.",
    "vercel.",
    "heroku.",
    "wordpress.",
    "shopify.",
    "wix.",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SITEWATCH_*)
/// 2. TOML config file (if SITEWATCH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding the monitored sites.
    ///
    /// Set via SITEWATCH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for probe requests.
    ///
    /// Set via SITEWATCH_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-attempt probe timeout in milliseconds.
    ///
    /// Set via SITEWATCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Period of the full refresh pass in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Period of the cache expiry scan in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Lifetime of a persisted status in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Lifetime of an in-memory status in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub memory_ttl_ms: u64,

    /// Entries with less time than this left are reported as expiring.
    #[serde(default = "default_expiry_margin_ms")]
    pub expiry_margin_ms: u64,

    /// URL fragments identifying major sites.
    ///
    /// Set via SITEWATCH_MAJOR_SITES environment variable.
    #[serde(default = "default_major_sites")]
    pub major_sites: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sitewatch.sqlite")
}

fn default_user_agent() -> String {
    "sitewatch/0.1".into()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_ttl_ms() -> u64 {
    30_000
}

fn default_expiry_margin_ms() -> u64 {
    5_000
}

fn default_major_sites() -> Vec<String> {
    DEFAULT_MAJOR_SITES.iter().map(|s| s.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            refresh_interval_ms: default_interval_ms(),
            cleanup_interval_ms: default_interval_ms(),
            cache_ttl_ms: default_ttl_ms(),
            memory_ttl_ms: default_ttl_ms(),
            expiry_margin_ms: default_expiry_margin_ms(),
            major_sites: default_major_sites(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// Cache timing derived from this configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_millis(self.cache_ttl_ms),
            memory_ttl: Duration::from_millis(self.memory_ttl_ms),
            expiry_margin: Duration::from_millis(self.expiry_margin_ms),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SITEWATCH_`
    /// 2. TOML file from `config_file`, or `SITEWATCH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load(config_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let config_file = config_file.or_else(|| std::env::var("SITEWATCH_CONFIG_FILE").ok().map(PathBuf::from));
        if let Some(config_path) = config_file {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(
            Env::prefixed("SITEWATCH_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
