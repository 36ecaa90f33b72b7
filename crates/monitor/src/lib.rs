//! Scheduling and presentation bridge for sitewatch.
//!
//! [`SiteMonitor`] decides when sites are probed, writes results through the
//! cache and pushes them to a [`SiteView`].

pub mod monitor;
pub mod view;

pub use monitor::{MonitorConfig, MonitorState, SiteMonitor};
pub use view::SiteView;
