//! sitewatch entry point.
//!
//! One-shot commands manage the monitored list; `watch` opens an interactive
//! shell while sites are refreshed in the background. Logging goes to stderr
//! so it does not interleave with the site list on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitewatch_client::{ProbeConfig, SiteChecker};
use sitewatch_core::{AppConfig, CacheDb, ExpiryReceiver, SiteCache, SiteRegistry};
use sitewatch_monitor::{MonitorConfig, SiteMonitor, SiteView};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod view;

use handler::{Flow, HELP, ShellHandler};
use view::TerminalView;

#[derive(Parser)]
#[command(name = "sitewatch", version)]
#[command(about = "Monitor website availability, TLS and CDN protections", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "SITEWATCH_CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring a site and check it once
    Add {
        /// Site URL, with or without scheme
        url: String,
    },

    /// Stop monitoring a site
    Remove {
        /// Site URL as listed
        url: String,
    },

    /// Show monitored sites with their last known status
    List,

    /// Probe a URL once without touching the monitored list
    Check {
        /// Site URL, with or without scheme
        url: String,
    },

    /// Interactive shell with background refresh
    Watch,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if std::env::var("SITEWATCH_LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// Wire the cache, registry, probe and monitor together.
async fn build(config: &AppConfig, view: Arc<TerminalView>) -> Result<(SiteMonitor, ExpiryReceiver)> {
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
    let (cache, expiry_rx) = SiteCache::new(db, config.cache_config());
    let checker = SiteChecker::http(ProbeConfig::from(config)).context("failed to build HTTP client")?;
    let monitor = SiteMonitor::new(SiteRegistry::new(cache), checker, view, MonitorConfig::from(config));
    Ok((monitor, expiry_rx))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = AppConfig::load(cli.config)?;
    tracing::debug!(db_path = %config.db_path.display(), "configuration loaded");

    let view = Arc::new(TerminalView::new());

    match cli.command {
        Commands::Add { url } => {
            let (monitor, _) = build(&config, view).await?;
            let url = monitor.add_site(&url).await?;
            println!("monitoring {url}");
        }
        Commands::Remove { url } => {
            let (monitor, _) = build(&config, view).await?;
            let url = sitewatch_core::url::sanitize(&url);
            if !monitor.registry().contains(&url).await {
                anyhow::bail!("not monitored: {url}");
            }
            monitor.registry().remove(&url).await;
            println!("removed {url}");
        }
        Commands::List => {
            let (monitor, _) = build(&config, view.clone()).await?;
            let sites = monitor.cache().sites().await;
            if sites.is_empty() {
                println!("no sites monitored; add one with `sitewatch add <url>`");
            }
            for (url, entry) in sites {
                view.render_site(&url, &entry.data);
            }
        }
        Commands::Check { url } => {
            let url = sitewatch_core::url::sanitize(&url);
            sitewatch_core::url::validate(&url).with_context(|| format!("invalid URL {url}"))?;
            let checker = SiteChecker::http(ProbeConfig::from(&config)).context("failed to build HTTP client")?;
            let status = checker.check(&url).await;
            view.show_detail_panel(&url, &status);
        }
        Commands::Watch => watch(&config, view).await?,
    }

    Ok(())
}

async fn watch(config: &AppConfig, view: Arc<TerminalView>) -> Result<()> {
    let (monitor, expiry_rx) = build(config, view).await?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sitewatch watching");
    println!("sitewatch v{}", env!("CARGO_PKG_VERSION"));
    println!("{HELP}");

    let loader = monitor.clone();
    tokio::spawn(async move { loader.load_sites().await });
    let runner = monitor.clone();
    let run = tokio::spawn(async move { runner.run(expiry_rx).await });

    let shell = ShellHandler::new(monitor);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if shell.handle_line(&line).await == Flow::Quit {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    run.abort();
    tracing::info!("sitewatch stopped");
    Ok(())
}
