//! HTTP transport used by probe attempts.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

/// Errors from a single transport request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("client error: {0}")]
    Client(String),
}

/// Completed response: status code and headers, body discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lower-cased; repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
}

/// A single GET against an absolute URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, ProbeError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Build a transport with the given user agent and per-request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| ProbeError::Client(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, ProbeError> {
        let url = url::Url::parse(url).map_err(|e| ProbeError::Client(format!("invalid URL {url}: {e}")))?;

        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout
            } else if e.is_builder() {
                ProbeError::Client(e.to_string())
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

        Ok(RawResponse { status: response.status().as_u16(), headers: collect_headers(response.headers()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_collect_headers_joins_duplicates() {
        let mut headers = HeaderMap::new();
        headers.append("server", HeaderValue::from_static("nginx"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let collected = collect_headers(&headers);
        assert_eq!(collected["server"], "nginx");
        assert_eq!(collected["set-cookie"], "a=1, b=2");
    }

    #[test]
    fn test_http_transport_new() {
        assert!(HttpTransport::new("sitewatch/0.1", Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_is_client_error() {
        let transport = HttpTransport::new("sitewatch/0.1", Duration::from_secs(5)).unwrap();
        let result = transport.get("not a url").await;
        assert!(matches!(result, Err(ProbeError::Client(_))));
    }
}
