//! CDN/WAF signature detection from response headers.
//!
//! Header names are expected lower-cased, as produced by the transport.

use std::collections::BTreeMap;

use sitewatch_core::Protections;

/// Substrings of the `server` header that indicate a CDN, WAF or hosting front.
pub const PROTECTION_SIGNS: &[&str] = &[
    "cloudflare",
    "nginx",
    "apache",
    "varnish",
    "akamai",
    "fastly",
    "cdn",
    "sucuri",
    "incapsula",
    "aws",
    "azure",
    "gcp",
];

/// Headers whose presence alone marks a protected or proxied site.
pub const PROTECTION_HEADERS: &[&str] = &[
    "cf-ray",
    "x-cache",
    "x-served-by",
    "x-cache-hits",
    "x-varnish",
    "x-akamai-transformed",
    "x-sucuri-id",
    "x-cdn",
    "x-fastly-request-id",
    "x-amz-cf-id",
    "x-azure-ref",
    "x-goog-served-by",
];

fn server_header(headers: &BTreeMap<String, String>) -> String {
    headers.get("server").map(|s| s.to_lowercase()).unwrap_or_default()
}

/// Derive the protection flags. Each flag is computed independently.
pub fn detect_protections(headers: &BTreeMap<String, String>) -> Protections {
    let server = server_header(headers);
    let has = |name: &str| headers.contains_key(name);

    Protections {
        cloudflare: has("cf-ray") || has("cf-cache-status"),
        akamai: has("x-akamai-transformed") || has("akamai-origin-hop"),
        varnish: has("x-varnish") || has("x-cache-hits"),
        nginx: server.contains("nginx"),
        apache: server.contains("apache"),
    }
}

/// Whether the headers show any protection signature.
pub fn is_protected_site(headers: &BTreeMap<String, String>) -> bool {
    let server = server_header(headers);
    PROTECTION_SIGNS.iter().any(|sign| server.contains(sign))
        || PROTECTION_HEADERS.iter().any(|name| headers.contains_key(*name))
}

/// Whether `url` contains one of the major-site fragments.
pub fn is_major_site(url: &str, major_sites: &[String]) -> bool {
    major_sites.iter().any(|site| url.contains(site.as_str()))
}
