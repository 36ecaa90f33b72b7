//! Terminal rendering of the site list and detail panel.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use sitewatch_core::SiteStatus;
use sitewatch_core::status::format_timestamp;
use sitewatch_monitor::SiteView;

/// One line per site: state, URL, latency, scheme and detected protections.
pub fn format_row(url: &str, status: &SiteStatus) -> String {
    let latency = match (status.online, status.avg_response) {
        (Some(true), Some(ms)) => format!("{ms}ms"),
        _ => "-".to_string(),
    };
    let scheme = if status.ssl { "https" } else { "http" };
    let protections = status.protections.detected().join(",");

    let mut line = format!("[{:<7}] {url:<40} {latency:>7}", status.label());
    if status.online == Some(true) {
        line.push_str(&format!("  {scheme}"));
        if !protections.is_empty() {
            line.push_str(&format!("  {protections}"));
        }
    }
    line
}

/// Multi-line detail block for one site.
pub fn format_detail(url: &str, status: &SiteStatus) -> String {
    let mut out = String::new();
    out.push_str(&format!("== {url} ==\n"));
    out.push_str(&format!("status:      {}\n", status.label()));
    out.push_str(&format!("last check:  {}\n", format_timestamp(status.timestamp)));
    out.push_str(&format!("cloudflare:  {}\n", if status.protections.cloudflare { "yes" } else { "no" }));
    out.push_str(&format!("ssl:         {}\n", if status.ssl { "yes" } else { "no" }));

    match (status.online, status.avg_response) {
        (Some(true), Some(ms)) => out.push_str(&format!("response:    {ms}ms\n")),
        _ => out.push_str("response:    -\n"),
    }
    if let Some(code) = status.status_code {
        out.push_str(&format!("http status: {code}\n"));
    }

    let detected = status.protections.detected();
    if !detected.is_empty() {
        out.push_str(&format!("protections: {}\n", detected.join(", ")));
    }

    match &status.headers {
        Some(headers) if !headers.is_empty() => {
            out.push_str("headers:\n");
            for (name, value) in headers {
                out.push_str(&format!("  {name}: {value}\n"));
            }
        }
        _ => out.push_str("headers:     no response\n"),
    }
    out
}

/// [`SiteView`] that prints to stdout and remembers which rows it has shown.
#[derive(Debug, Default)]
pub struct TerminalView {
    rows: Mutex<BTreeSet<String>>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    fn print(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
        let _ = stdout.flush();
    }
}

impl SiteView for TerminalView {
    fn render_site(&self, url: &str, status: &SiteStatus) {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).insert(url.to_string());
        self.print(&format_row(url, status));
    }

    fn remove_all_rows(&self) {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.print("-- sites --");
    }

    fn show_detail_panel(&self, url: &str, status: &SiteStatus) {
        self.print(format_detail(url, status).trim_end());
    }

    fn hide_detail_panel(&self) {
        self.print("-- back to list --");
    }

    fn find_row(&self, url: &str) -> bool {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).contains(url)
    }
}
