//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Upper bound shared by every interval and TTL (24 hours).
const MAX_PERIOD_MS: u64 = 24 * 60 * 60 * 1000;

fn check_period(field: &str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::Invalid { field: field.into(), reason: format!("must be at least {min}ms") });
    }
    if value > MAX_PERIOD_MS {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must not exceed 24 hours".into() });
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - an interval or TTL is below its minimum or exceeds 24 hours
    /// - `expiry_margin_ms` is not shorter than `cache_ttl_ms`
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        check_period("refresh_interval_ms", self.refresh_interval_ms, 1_000)?;
        check_period("cleanup_interval_ms", self.cleanup_interval_ms, 1_000)?;
        check_period("cache_ttl_ms", self.cache_ttl_ms, 1_000)?;
        check_period("memory_ttl_ms", self.memory_ttl_ms, 1)?;

        if self.expiry_margin_ms >= self.cache_ttl_ms {
            return Err(ConfigError::Invalid {
                field: "expiry_margin_ms".into(),
                reason: "must be shorter than cache_ttl_ms".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.timeout_ms * 2 > self.refresh_interval_ms {
            tracing::warn!(
                timeout_ms = self.timeout_ms,
                refresh_interval_ms = self.refresh_interval_ms,
                "A worst-case probe (https then http) outlasts the refresh interval; \
                 overlapping passes will be skipped"
            );
        }

        Ok(())
    }
}
