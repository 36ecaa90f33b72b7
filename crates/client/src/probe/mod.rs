//! Site reachability probe.
//!
//! ### Attempts
//! - Timed GET over `https://`, then once over `http://` if it did not succeed
//! - URLs that already carry a scheme are used as-is for both attempts
//! - Per-attempt timeout (default: 5s)
//!
//! ### Classification
//! - `200..399`: reachable, latency and headers recorded
//! - `>= 400`: the host answered with an error, offline
//! - status `0` on a major or protected site: blocked, offline
//! - anything else, including transport errors: unreachable, offline
//!
//! No error escapes [`SiteChecker::check`]; every failure becomes the
//! canonical offline status.

pub mod protections;
pub mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sitewatch_core::status::now_ms;
use sitewatch_core::{AppConfig, SiteStatus};
use tracing::debug;

pub use protections::{detect_protections, is_major_site, is_protected_site};
pub use transport::{HttpTransport, ProbeError, RawResponse, Transport};

/// Configuration for the probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// User agent string (default: "sitewatch/0.1")
    pub user_agent: String,

    /// Per-attempt timeout (default: 5s)
    pub timeout: Duration,

    /// URL fragments identifying major sites.
    pub major_sites: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ProbeConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), major_sites: config.major_sites.clone() }
    }
}

/// Classified outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// Success status; the only outcome that produces an online status.
    Reachable { elapsed_ms: u64, status: u16, headers: BTreeMap<String, String> },
    /// The host answered with an error status.
    HttpError { status: u16 },
    /// Empty response from a major or protected site.
    Blocked,
    /// Transport failure or any other response.
    Unreachable { reason: String },
}

impl Attempt {
    /// Classify a completed response for `url`.
    pub fn classify(url: &str, response: RawResponse, elapsed_ms: u64, major_sites: &[String]) -> Self {
        match response.status {
            200..399 => Attempt::Reachable { elapsed_ms, status: response.status, headers: response.headers },
            status if status >= 400 => Attempt::HttpError { status },
            0 if is_major_site(url, major_sites) || is_protected_site(&response.headers) => Attempt::Blocked,
            status => Attempt::Unreachable { reason: format!("unexpected status {status}") },
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Attempt::Reachable { .. })
    }
}

/// Probes sites through a [`Transport`].
#[derive(Clone)]
pub struct SiteChecker {
    transport: Arc<dyn Transport>,
    config: ProbeConfig,
}

impl std::fmt::Debug for SiteChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteChecker").field("config", &self.config).finish_non_exhaustive()
    }
}

impl SiteChecker {
    pub fn new(transport: Arc<dyn Transport>, config: ProbeConfig) -> Self {
        Self { transport, config }
    }

    /// Create a checker backed by [`HttpTransport`].
    pub fn http(config: ProbeConfig) -> Result<Self, ProbeError> {
        let transport = HttpTransport::new(&config.user_agent, config.timeout)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run one timed attempt against `target`.
    pub async fn attempt(&self, url: &str, target: &str) -> Attempt {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.config.timeout, self.transport.get(target)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        };
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let attempt = match result {
            Ok(response) => Attempt::classify(url, response, elapsed_ms, &self.config.major_sites),
            Err(e) => Attempt::Unreachable { reason: e.to_string() },
        };
        debug!(request = target, elapsed_ms, ?attempt, "probe attempt");
        attempt
    }

    /// Check `url` (a sanitized site URL) and return a fresh status.
    pub async fn check(&self, url: &str) -> SiteStatus {
        for secure in [true, false] {
            let target = sitewatch_core::url::with_scheme(url, secure);
            if let Attempt::Reachable { elapsed_ms, status, headers } = self.attempt(url, &target).await {
                return SiteStatus {
                    online: Some(true),
                    avg_response: Some(elapsed_ms),
                    protections: detect_protections(&headers),
                    headers: Some(headers),
                    ssl: target.starts_with("https://"),
                    status_code: Some(status),
                    timestamp: now_ms(),
                };
            }
        }

        debug!(url, "site offline after https and http attempts");
        SiteStatus::offline()
    }
}
