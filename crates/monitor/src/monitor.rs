//! Refresh scheduling and user intents.
//!
//! ### Scheduling
//! - Full refresh pass on a timer (default: 30s, first pass immediate)
//! - Targeted refresh for every [`ExpiryNotice`] from the cache
//! - Cache expiry scan on its own timer (default: 30s)
//!
//! ### Probing
//! - A full pass probes only sites whose durable entry is stale
//! - Targeted and user-requested refreshes always probe
//! - At most one probe per site at a time; a duplicate request is skipped and
//!   the running probe's result is pushed to the row and the detail panel
//!
//! [`ExpiryNotice`]: sitewatch_core::ExpiryNotice

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sitewatch_client::SiteChecker;
use sitewatch_core::status::now_ms;
use sitewatch_core::{AppConfig, Error, ExpiryReceiver, SiteCache, SiteRegistry, SiteStatus};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::view::SiteView;

/// Timers driving the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Period of the full refresh pass (default: 30s)
    pub refresh_interval: Duration,

    /// Period of the cache expiry scan (default: 30s)
    pub cleanup_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for MonitorConfig {
    fn from(config: &AppConfig) -> Self {
        Self { refresh_interval: config.refresh_interval(), cleanup_interval: config.cleanup_interval() }
    }
}

/// Whole-set refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Refreshing,
}

struct Inner {
    registry: SiteRegistry,
    checker: SiteChecker,
    view: Arc<dyn SiteView>,
    config: MonitorConfig,
    current_site: Mutex<Option<String>>,
    refreshing: AtomicBool,
    in_flight: Mutex<HashSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases a site's probe slot when the probe ends, however it ends.
struct ProbeSlot {
    inner: Arc<Inner>,
    url: String,
}

impl Drop for ProbeSlot {
    fn drop(&mut self) {
        lock(&self.inner.in_flight).remove(&self.url);
    }
}

/// Returns the monitor to `Idle` when a full pass ends.
struct PassGuard {
    inner: Arc<Inner>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.inner.refreshing.store(false, Ordering::Release);
    }
}

/// Keeps the view in sync with the monitored sites.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct SiteMonitor {
    inner: Arc<Inner>,
}

impl SiteMonitor {
    pub fn new(registry: SiteRegistry, checker: SiteChecker, view: Arc<dyn SiteView>, config: MonitorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                checker,
                view,
                config,
                current_site: Mutex::new(None),
                refreshing: AtomicBool::new(false),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.inner.registry
    }

    pub fn cache(&self) -> &SiteCache {
        self.inner.registry.cache()
    }

    /// Site whose detail panel is open, if any.
    pub fn current_site(&self) -> Option<String> {
        lock(&self.inner.current_site).clone()
    }

    pub fn state(&self) -> MonitorState {
        if self.inner.refreshing.load(Ordering::Acquire) { MonitorState::Refreshing } else { MonitorState::Idle }
    }

    fn is_current(&self, url: &str) -> bool {
        lock(&self.inner.current_site).as_deref() == Some(url)
    }

    /// Send `status` to the view: the row (created when `create_row` is set,
    /// updated only if present otherwise) and the detail panel when `url` is
    /// the current site.
    fn push(&self, url: &str, status: &SiteStatus, create_row: bool) {
        let view = &self.inner.view;
        if create_row || view.find_row(url) {
            view.render_site(url, status);
        }
        if self.is_current(url) {
            view.show_detail_panel(url, status);
        }
    }

    /// Probe `url` and store the result.
    ///
    /// Returns `None` when a probe for `url` is already running or the site
    /// was removed while it was being probed.
    async fn probe(&self, url: &str) -> Option<SiteStatus> {
        if !lock(&self.inner.in_flight).insert(url.to_string()) {
            debug!(url, "probe already in flight, skipping");
            return None;
        }
        let _slot = ProbeSlot { inner: self.inner.clone(), url: url.to_string() };

        let status = self.inner.checker.check(url).await;
        if !self.cache().replace(url, &status).await {
            return None;
        }
        debug!(url, state = status.label(), "probe stored");
        Some(status)
    }

    /// Probe `url` and push the result, creating the row if asked to.
    async fn probe_and_push(&self, url: &str, create_row: bool) {
        if let Some(status) = self.probe(url).await {
            self.push(url, &status, create_row);
        }
    }

    /// Refresh every registered site. Stale sites are probed, fresh ones are
    /// pushed from the cache. Skipped if a pass is already running.
    pub async fn refresh_all(&self) {
        if self.inner.refreshing.swap(true, Ordering::AcqRel) {
            debug!("refresh pass already running, skipping");
            return;
        }
        let _pass = PassGuard { inner: self.inner.clone() };

        let sites = self.registry().list().await;
        info!(count = sites.len(), "refreshing sites");

        let mut tasks = JoinSet::new();
        for url in sites {
            let monitor = self.clone();
            tasks.spawn(async move {
                let entry = monitor.cache().entry(&url).await;
                match entry {
                    Some(entry) if entry.is_valid(now_ms()) => {
                        debug!(url = %url, "using cached status");
                        monitor.push(&url, &entry.data, true);
                    }
                    _ => {
                        debug!(url = %url, "cache stale, probing");
                        monitor.probe_and_push(&url, true).await;
                    }
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "site refresh task failed");
            }
        }
        info!("refresh pass complete");
    }

    /// Probe the given sites regardless of cache state.
    ///
    /// Rows are only updated, never created.
    pub async fn refresh_sites(&self, urls: Vec<String>) {
        info!(count = urls.len(), "refreshing expiring sites");

        let mut tasks = JoinSet::new();
        for url in urls {
            let monitor = self.clone();
            tasks.spawn(async move { monitor.probe_and_push(&url, false).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "site refresh task failed");
            }
        }
    }

    /// Register a site from user input and probe it right away.
    pub async fn add_site(&self, raw: &str) -> Result<String, Error> {
        let url = self.registry().add(raw).await?;
        info!(url = %url, "checking new site");
        self.inner.view.render_site(&url, &SiteStatus::pending());
        self.probe_and_push(&url, true).await;
        Ok(url)
    }

    /// Open the detail panel for `url`, probing only on a cache miss.
    pub async fn show_site_details(&self, url: &str) {
        *lock(&self.inner.current_site) = Some(url.to_string());

        if let Some(status) = self.cache().get(url).await {
            debug!(url, "details from cache");
            self.inner.view.show_detail_panel(url, &status);
            return;
        }

        debug!(url, "details need a live check");
        self.inner.view.show_detail_panel(url, &SiteStatus::pending());
        self.probe_and_push(url, false).await;
    }

    /// Force a probe of the current site.
    pub async fn refresh_site(&self) {
        let Some(url) = self.current_site() else {
            return;
        };
        info!(url = %url, "forced refresh");
        self.probe_and_push(&url, false).await;
    }

    /// Remove the current site, close its panel and reload the list.
    pub async fn delete_site(&self) {
        let Some(url) = self.current_site() else {
            return;
        };
        self.registry().remove(&url).await;
        self.hide_details().await;
        self.load_sites().await;
    }

    /// Close the detail panel, restoring the current site's row if it went
    /// missing while the panel was open.
    pub async fn hide_details(&self) {
        if let Some(url) = self.current_site()
            && !self.inner.view.find_row(&url)
            && let Some(status) = self.cache().get(&url).await
        {
            self.inner.view.render_site(&url, &status);
        }

        self.inner.view.hide_detail_panel();
        *lock(&self.inner.current_site) = None;
    }

    /// Rebuild the list from the cache, then run a full pass.
    pub async fn load_sites(&self) {
        self.inner.view.remove_all_rows();
        for url in self.registry().list().await {
            let status = self.cache().get(&url).await.unwrap_or_else(SiteStatus::pending);
            self.inner.view.render_site(&url, &status);
        }
        self.refresh_all().await;
    }

    /// Drive the refresh timer and expiry notices until the notice channel
    /// closes or the future is dropped. The cache expiry scan runs on its own
    /// task and stops together with this one, aborted or not.
    pub async fn run(&self, mut expiry_rx: ExpiryReceiver) {
        let _cleanup = self.cache().spawn_cleanup(self.inner.config.cleanup_interval);
        let mut timer = tokio::time::interval(self.inner.config.refresh_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            refresh_ms = u64::try_from(self.inner.config.refresh_interval.as_millis()).unwrap_or(u64::MAX),
            cleanup_ms = u64::try_from(self.inner.config.cleanup_interval.as_millis()).unwrap_or(u64::MAX),
            "monitor started"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let monitor = self.clone();
                    tokio::spawn(async move { monitor.refresh_all().await });
                }
                notice = expiry_rx.recv() => match notice {
                    Some(notice) => {
                        let monitor = self.clone();
                        tokio::spawn(async move { monitor.refresh_sites(notice.urls).await });
                    }
                    None => break,
                },
            }
        }

        info!("monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sitewatch_client::{ProbeConfig, ProbeError, RawResponse, Transport};
    use sitewatch_core::{CacheConfig, CacheDb, CacheEntry};
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    /// Answers every request with the same status after an optional delay.
    struct FixedTransport {
        status: u16,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn get(&self, _url: &str) -> Result<RawResponse, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let mut headers = BTreeMap::new();
            headers.insert("server".to_string(), "nginx".to_string());
            Ok(RawResponse { status: self.status, headers })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Row(String, Option<bool>),
        Cleared,
        Detail(String, Option<bool>),
        DetailHidden,
    }

    #[derive(Default)]
    struct RecordingView {
        rows: Mutex<BTreeMap<String, SiteStatus>>,
        events: Mutex<Vec<Event>>,
    }

    impl RecordingView {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn row(&self, url: &str) -> Option<SiteStatus> {
            self.rows.lock().unwrap().get(url).cloned()
        }
    }

    impl SiteView for RecordingView {
        fn render_site(&self, url: &str, status: &SiteStatus) {
            self.rows.lock().unwrap().insert(url.to_string(), status.clone());
            self.events.lock().unwrap().push(Event::Row(url.to_string(), status.online));
        }

        fn remove_all_rows(&self) {
            self.rows.lock().unwrap().clear();
            self.events.lock().unwrap().push(Event::Cleared);
        }

        fn show_detail_panel(&self, url: &str, status: &SiteStatus) {
            self.events.lock().unwrap().push(Event::Detail(url.to_string(), status.online));
        }

        fn hide_detail_panel(&self) {
            self.events.lock().unwrap().push(Event::DetailHidden);
        }

        fn find_row(&self, url: &str) -> bool {
            self.rows.lock().unwrap().contains_key(url)
        }
    }

    struct Harness {
        monitor: SiteMonitor,
        view: Arc<RecordingView>,
        transport: Arc<FixedTransport>,
        expiry_rx: ExpiryReceiver,
    }

    impl Harness {
        fn calls(&self) -> usize {
            self.transport.calls.load(Ordering::SeqCst)
        }
    }

    async fn harness(status: u16, delay: Duration, cache_config: CacheConfig, config: MonitorConfig) -> Harness {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (cache, expiry_rx) = SiteCache::new(db, cache_config);
        let transport = Arc::new(FixedTransport { status, delay, calls: AtomicUsize::new(0) });
        let checker = SiteChecker::new(transport.clone(), ProbeConfig::default());
        let view = Arc::new(RecordingView::default());
        let monitor = SiteMonitor::new(SiteRegistry::new(cache), checker, view.clone(), config);
        Harness { monitor, view, transport, expiry_rx }
    }

    async fn default_harness(status: u16) -> Harness {
        harness(status, Duration::ZERO, CacheConfig::default(), MonitorConfig::default()).await
    }

    async fn insert_stale(monitor: &SiteMonitor, url: &str) {
        let entry = CacheEntry::new(SiteStatus::pending(), now_ms() - 60_000, 30_000);
        let key = url.to_string();
        monitor
            .cache()
            .db()
            .update_sites(move |sites| {
                sites.insert(key, entry);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_monitor_config_default() {
        let config = MonitorConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_add_site_probes_and_renders() {
        let h = default_harness(200).await;

        let url = h.monitor.add_site("HTTPS://Example.com").await.unwrap();

        assert_eq!(url, "example.com");
        assert_eq!(h.calls(), 1);
        assert_eq!(h.view.row("example.com").unwrap().online, Some(true));
        assert_eq!(h.monitor.cache().get("example.com").await.unwrap().online, Some(true));
    }

    #[tokio::test]
    async fn test_add_site_rejects_duplicates_without_probing() {
        let h = default_harness(200).await;
        h.monitor.add_site("example.com").await.unwrap();

        let result = h.monitor.add_site("example.com").await;

        assert!(matches!(result, Err(Error::DuplicateSite(_))));
        assert_eq!(h.calls(), 1);
    }

    #[tokio::test]
    async fn test_add_site_http_error_is_offline() {
        let h = default_harness(403).await;

        h.monitor.add_site("example.com").await.unwrap();

        let status = h.monitor.cache().get("example.com").await.unwrap();
        assert_eq!(status.online, Some(false));
        assert_eq!(status.avg_response, None);
    }

    #[tokio::test]
    async fn test_refresh_all_uses_fresh_cache() {
        let h = default_harness(200).await;
        h.monitor.registry().add("example.com").await.unwrap();

        h.monitor.refresh_all().await;

        assert_eq!(h.calls(), 0);
        assert_eq!(h.view.events(), vec![Event::Row("example.com".into(), None)]);
        assert_eq!(h.monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_refresh_all_probes_stale_entries() {
        let h = default_harness(200).await;
        insert_stale(&h.monitor, "a.com").await;
        insert_stale(&h.monitor, "b.com").await;
        h.monitor.registry().add("fresh.com").await.unwrap();

        h.monitor.refresh_all().await;

        assert_eq!(h.calls(), 2);
        assert_eq!(h.view.row("a.com").unwrap().online, Some(true));
        assert_eq!(h.view.row("b.com").unwrap().online, Some(true));
        assert_eq!(h.view.row("fresh.com").unwrap().online, None);
    }

    #[tokio::test]
    async fn test_refresh_passes_never_overlap() {
        let h = harness(200, Duration::from_millis(100), CacheConfig::default(), MonitorConfig::default()).await;
        insert_stale(&h.monitor, "slow.com").await;

        let first = h.monitor.clone();
        let running = tokio::spawn(async move { first.refresh_all().await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.monitor.state(), MonitorState::Refreshing);

        h.monitor.refresh_all().await;
        running.await.unwrap();

        assert_eq!(h.calls(), 1);
        assert_eq!(h.monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_duplicate_probe_is_skipped() {
        let h = harness(200, Duration::from_millis(100), CacheConfig::default(), MonitorConfig::default()).await;
        h.monitor.registry().add("example.com").await.unwrap();
        *lock(&h.monitor.inner.current_site) = Some("example.com".into());

        let first = h.monitor.clone();
        let second = h.monitor.clone();
        tokio::join!(first.refresh_sites(vec!["example.com".into()]), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            second.refresh_site().await;
        });

        assert_eq!(h.calls(), 1);
        assert!(h.view.events().contains(&Event::Detail("example.com".into(), Some(true))));
    }

    #[tokio::test]
    async fn test_refresh_sites_updates_existing_rows_only() {
        let h = default_harness(200).await;
        h.monitor.registry().add("shown.com").await.unwrap();
        h.monitor.registry().add("hidden.com").await.unwrap();
        h.view.render_site("shown.com", &SiteStatus::pending());

        h.monitor.refresh_sites(vec!["shown.com".into(), "hidden.com".into()]).await;

        assert_eq!(h.calls(), 2);
        assert_eq!(h.view.row("shown.com").unwrap().online, Some(true));
        assert!(h.view.row("hidden.com").is_none());
        assert_eq!(h.monitor.cache().get("hidden.com").await.unwrap().online, Some(true));
    }

    #[tokio::test]
    async fn test_refresh_of_removed_site_does_not_resurrect_it() {
        let h = default_harness(200).await;

        h.monitor.refresh_sites(vec!["gone.com".into()]).await;

        assert_eq!(h.calls(), 1);
        assert!(h.monitor.registry().list().await.is_empty());
    }

    #[tokio::test]
    async fn test_show_site_details_prefers_cache() {
        let h = default_harness(200).await;
        h.monitor.add_site("example.com").await.unwrap();

        h.monitor.show_site_details("example.com").await;

        assert_eq!(h.calls(), 1);
        assert_eq!(h.monitor.current_site().as_deref(), Some("example.com"));
        assert_eq!(h.view.events().last(), Some(&Event::Detail("example.com".into(), Some(true))));
    }

    #[tokio::test]
    async fn test_show_site_details_probes_on_miss() {
        let h = default_harness(200).await;
        insert_stale(&h.monitor, "old.com").await;
        h.view.render_site("old.com", &SiteStatus::pending());

        h.monitor.show_site_details("old.com").await;

        assert_eq!(h.calls(), 1);
        let events = h.view.events();
        assert!(events.contains(&Event::Detail("old.com".into(), Some(true))));
        assert_eq!(h.view.row("old.com").unwrap().online, Some(true));
    }

    #[tokio::test]
    async fn test_refresh_site_without_current_is_noop() {
        let h = default_harness(200).await;
        h.monitor.refresh_site().await;
        h.monitor.delete_site().await;
        assert_eq!(h.calls(), 0);
        assert!(h.view.events().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_site_forces_probe() {
        let h = default_harness(200).await;
        h.monitor.add_site("example.com").await.unwrap();
        h.monitor.show_site_details("example.com").await;

        h.monitor.refresh_site().await;

        assert_eq!(h.calls(), 2);
    }

    #[tokio::test]
    async fn test_delete_site() {
        let h = default_harness(200).await;
        h.monitor.add_site("keep.com").await.unwrap();
        h.monitor.add_site("drop.com").await.unwrap();
        h.monitor.show_site_details("drop.com").await;

        h.monitor.delete_site().await;

        assert_eq!(h.monitor.registry().list().await, vec!["keep.com".to_string()]);
        assert!(h.monitor.current_site().is_none());
        assert!(h.view.row("drop.com").is_none());
        assert!(h.view.row("keep.com").is_some());
        let events = h.view.events();
        assert!(events.contains(&Event::DetailHidden));
        assert!(events.contains(&Event::Cleared));
    }

    #[tokio::test]
    async fn test_hide_details_restores_missing_row() {
        let h = default_harness(200).await;
        h.monitor.add_site("example.com").await.unwrap();
        h.monitor.show_site_details("example.com").await;
        h.view.remove_all_rows();

        h.monitor.hide_details().await;

        assert!(h.view.row("example.com").is_some());
        assert!(h.monitor.current_site().is_none());
        assert_eq!(h.view.events().last(), Some(&Event::DetailHidden));
    }

    #[tokio::test]
    async fn test_load_sites_renders_placeholders_then_refreshes() {
        let h = default_harness(200).await;
        insert_stale(&h.monitor, "old.com").await;

        h.monitor.load_sites().await;

        let events = h.view.events();
        assert_eq!(events[0], Event::Cleared);
        assert_eq!(events[1], Event::Row("old.com".into(), None));
        assert_eq!(events.last(), Some(&Event::Row("old.com".into(), Some(true))));
    }

    #[tokio::test]
    async fn test_pending_site_comes_online_through_expiry_notice() {
        let cache_config = CacheConfig {
            ttl: Duration::from_secs(2),
            memory_ttl: Duration::from_secs(2),
            expiry_margin: Duration::from_secs(5),
        };
        let config =
            MonitorConfig { refresh_interval: Duration::from_secs(3600), cleanup_interval: Duration::from_millis(50) };
        let Harness { monitor, view, expiry_rx, .. } = harness(200, Duration::ZERO, cache_config, config).await;

        monitor.registry().add("example.com").await.unwrap();
        assert!(monitor.cache().entry("example.com").await.unwrap().data.is_pending());
        view.render_site("example.com", &SiteStatus::pending());

        let runner = monitor.clone();
        let run = tokio::spawn(async move { runner.run(expiry_rx).await });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while view.row("example.com").and_then(|s| s.online).is_none() {
            assert!(tokio::time::Instant::now() < deadline, "site never came online");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        // Let a few more cleanup cycles run.
        tokio::time::sleep(Duration::from_millis(200)).await;
        run.abort();

        assert_eq!(monitor.cache().entry("example.com").await.unwrap().data.online, Some(true));
        let online: Vec<Option<bool>> = view
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Row(url, online) if url == "example.com" => Some(online),
                _ => None,
            })
            .collect();
        let first_known = online.iter().position(Option::is_some).unwrap();
        assert!(online[first_known..].iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn test_aborted_run_stops_cleanup_scan() {
        let config =
            MonitorConfig { refresh_interval: Duration::from_secs(3600), cleanup_interval: Duration::from_millis(20) };
        let Harness { monitor, expiry_rx, .. } = harness(200, Duration::ZERO, CacheConfig::default(), config).await;
        let metrics = tokio::runtime::Handle::current().metrics();
        assert_eq!(metrics.num_alive_tasks(), 0);

        let runner = monitor.clone();
        let run = tokio::spawn(async move { runner.run(expiry_rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(metrics.num_alive_tasks(), 2);

        run.abort();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(metrics.num_alive_tasks(), 0);
    }
}
