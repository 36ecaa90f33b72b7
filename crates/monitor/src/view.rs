//! Presentation contract.
//!
//! The monitor never formats anything itself; it hands plain statuses to a
//! [`SiteView`]. Implementations must not block: calls are made from async
//! tasks, possibly several at once.

use sitewatch_core::SiteStatus;

/// A site list with an optional detail panel for one site.
pub trait SiteView: Send + Sync {
    /// Insert or update the row for `url`.
    fn render_site(&self, url: &str, status: &SiteStatus);

    fn remove_all_rows(&self);

    /// Show (or refresh) the detail panel for `url`.
    fn show_detail_panel(&self, url: &str, status: &SiteStatus);

    fn hide_detail_panel(&self);

    /// Whether a row for `url` is currently displayed.
    fn find_row(&self, url: &str) -> bool;
}
