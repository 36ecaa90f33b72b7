//! Network client code for sitewatch.
//!
//! This crate provides the reachability probe: the [`Transport`] seam, its
//! reqwest implementation, outcome classification and protection detection.

pub mod probe;

pub use probe::{
    Attempt, HttpTransport, ProbeConfig, ProbeError, RawResponse, SiteChecker, Transport, detect_protections,
    is_major_site, is_protected_site,
};
