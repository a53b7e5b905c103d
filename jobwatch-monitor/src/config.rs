//! Monitor configuration
//!
//! Defines the configurable parameters of the watcher: which registry and
//! job directory to watch, how often to poll, and where page sizes are
//! remembered.

use std::path::PathBuf;
use std::time::Duration;

use jobwatch_client::JobKind;
use jobwatch_core::domain::page::DEFAULT_PAGE_SIZE;

use crate::error::{MonitorError, Result};
use crate::monitor::MonitorSettings;
use crate::scheduler::POLL_INTERVAL;

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry base URL (e.g., "http://localhost:8080")
    pub registry_url: String,

    /// Which job directory to watch
    pub kind: JobKind,

    /// Delay between two background refreshes while jobs are active
    pub poll_interval: Duration,

    /// Page size used until one is stored for the view
    pub page_size: usize,

    /// File holding remembered page sizes; in memory when unset
    pub prefs_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(registry_url: String, kind: JobKind) -> Self {
        Self {
            registry_url,
            kind,
            poll_interval: POLL_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            prefs_path: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - JOBWATCH_URL (optional, default: http://localhost:8080)
    /// - JOBWATCH_KIND (optional, gc | purge | replication | webhook, default: gc)
    /// - JOBWATCH_PROJECT_ID, JOBWATCH_POLICY_ID (required for webhook)
    /// - POLL_INTERVAL (optional, seconds, default: 5)
    /// - PAGE_SIZE (optional, default: 15)
    /// - JOBWATCH_PREFS (optional, path of the page size file)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key/value source
    ///
    /// Unparseable numbers fall back to their defaults. An unknown job
    /// kind, or a webhook kind without its project and policy, is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let registry_url =
            lookup("JOBWATCH_URL").unwrap_or_else(|| "http://localhost:8080".to_string());

        let kind = match lookup("JOBWATCH_KIND") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("webhook") => {
                JobKind::WebhookExecutions {
                    project_id: required_id(&lookup, "JOBWATCH_PROJECT_ID")?,
                    policy_id: required_id(&lookup, "JOBWATCH_POLICY_ID")?,
                }
            }
            Some(raw) => JobKind::parse(raw.trim()).ok_or_else(|| {
                MonitorError::Config(format!(
                    "unknown JOBWATCH_KIND '{}', expected gc, purge, replication or webhook",
                    raw
                ))
            })?,
            None => JobKind::GarbageCollection,
        };

        let poll_interval = lookup("POLL_INTERVAL")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(POLL_INTERVAL);

        let page_size = lookup("PAGE_SIZE")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let prefs_path = lookup("JOBWATCH_PREFS")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            registry_url,
            kind,
            poll_interval,
            page_size,
            prefs_path,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.registry_url.is_empty() {
            return Err(MonitorError::Config("registry_url cannot be empty".into()));
        }

        if !self.registry_url.starts_with("http://") && !self.registry_url.starts_with("https://")
        {
            return Err(MonitorError::Config(
                "registry_url must start with http:// or https://".into(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(MonitorError::Config(
                "poll_interval must be greater than 0".into(),
            ));
        }

        if self.page_size == 0 {
            return Err(MonitorError::Config("page_size must be greater than 0".into()));
        }

        Ok(())
    }

    /// Settings of the monitor for the configured directory
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings::for_kind(self.kind)
            .with_poll_interval(self.poll_interval)
            .with_page_size(self.page_size)
    }
}

fn required_id(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<i64> {
    let raw = lookup(key).ok_or_else(|| {
        MonitorError::Config(format!("{} is required for webhook executions", key))
    })?;
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            MonitorError::Config(format!("{} must be a positive id, got '{}'", key, raw))
        })
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            "http://localhost:8080".to_string(),
            JobKind::GarbageCollection,
        )
    }
}
