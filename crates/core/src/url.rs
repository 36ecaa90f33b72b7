//! Site URL sanitization and validation.
//!
//! Monitored sites are keyed by their sanitized form: trimmed, lower-cased
//! and without an `http://` or `https://` prefix. The scheme is chosen per
//! probe attempt instead.

/// Error type for site URL validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Sanitize raw user input into a registry key.
///
/// 1. Trim leading/trailing whitespace
/// 2. Lowercase everything
/// 3. Strip a leading `http://` or `https://`
pub fn sanitize(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let stripped = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    stripped.to_string()
}

/// Validate a (sanitized) site URL by parsing it with `http://` assumed.
pub fn validate(site: &str) -> Result<::url::Url, UrlError> {
    if site.trim().is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = ::url::Url::parse(&with_scheme(site, false)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(UrlError::MissingHost(site.to_string())),
    }
}

/// Build the request target for one probe attempt.
///
/// URLs that already carry a scheme are returned unchanged.
pub fn with_scheme(site: &str, secure: bool) -> String {
    if site.contains("://") {
        site.to_string()
    } else if secure {
        format!("https://{site}")
    } else {
        format!("http://{site}")
    }
}
