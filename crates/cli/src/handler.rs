//! Watch shell command handling.
//!
//! Parses one input line into a [`Command`] and routes it to the monitor
//! intent it stands for.

use sitewatch_monitor::SiteMonitor;

use crate::error::ShellError;

pub const HELP: &str = "\
commands:
  add <url>    start monitoring a site
  show <url>   open the detail panel for a site
  refresh      re-check the site whose details are open
  delete       stop monitoring the site whose details are open
  back         close the detail panel
  list         redraw the site list and refresh it
  help         show this help
  quit         leave the shell";

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Show(String),
    Refresh,
    Delete,
    Back,
    List,
    Help,
    Quit,
}

impl Command {
    /// Parse one line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ShellError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let with_url = |command: &'static str| -> Result<String, ShellError> {
            match rest.as_slice() {
                [] => Err(ShellError::MissingArgument(command)),
                [url] => Ok(url.to_string()),
                _ => Err(ShellError::UnexpectedArgument(command)),
            }
        };
        let bare = |command: &'static str, parsed: Command| -> Result<Command, ShellError> {
            if rest.is_empty() { Ok(parsed) } else { Err(ShellError::UnexpectedArgument(command)) }
        };

        let command = match name.to_lowercase().as_str() {
            "add" => Command::Add(with_url("add")?),
            "show" => Command::Show(with_url("show")?),
            "refresh" => bare("refresh", Command::Refresh)?,
            "delete" => bare("delete", Command::Delete)?,
            "back" => bare("back", Command::Back)?,
            "list" => bare("list", Command::List)?,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ShellError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// What the shell loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Routes shell commands to the monitor.
#[derive(Clone)]
pub struct ShellHandler {
    monitor: SiteMonitor,
}

impl ShellHandler {
    pub fn new(monitor: SiteMonitor) -> Self {
        Self { monitor }
    }

    /// Run one input line, printing parse and user errors.
    pub async fn handle_line(&self, line: &str) -> Flow {
        match Command::parse(line) {
            Ok(Some(command)) => self.handle(command).await,
            Ok(None) => Flow::Continue,
            Err(e) => {
                println!("{e}");
                Flow::Continue
            }
        }
    }

    pub async fn handle(&self, command: Command) -> Flow {
        match command {
            Command::Add(raw) => match self.monitor.add_site(&raw).await {
                Ok(url) => tracing::info!(url = %url, "site added from shell"),
                Err(e) if e.is_user_error() => println!("{e}"),
                Err(e) => {
                    tracing::error!(error = %e, "failed to add site");
                    println!("could not add {raw}: storage failure");
                }
            },
            Command::Show(raw) => {
                let url = sitewatch_core::url::sanitize(&raw);
                if self.monitor.registry().contains(&url).await {
                    self.monitor.show_site_details(&url).await;
                } else {
                    println!("not monitored: {url}");
                }
            }
            Command::Refresh => self.with_current(|monitor| async move { monitor.refresh_site().await }).await,
            Command::Delete => self.with_current(|monitor| async move { monitor.delete_site().await }).await,
            Command::Back => self.monitor.hide_details().await,
            Command::List => self.monitor.load_sites().await,
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    async fn with_current<F, Fut>(&self, f: F)
    where
        F: FnOnce(SiteMonitor) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.monitor.current_site().is_none() {
            println!("no site selected; use `show <url>` first");
            return;
        }
        f(self.monitor.clone()).await;
    }
}
