//! Jobwatch
//!
//! Headless watcher for one registry job directory. Loads the first page,
//! follows it while any job on it is still running, and logs every status
//! change. Exits once nothing on the page is active anymore, or on Ctrl-C.
//! A first page that cannot be loaded is a startup failure.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobwatch_core::domain::job::{JobId, JobStatus};
use jobwatch_monitor::config::Config;
use jobwatch_monitor::gate::ConfirmationGate;
use jobwatch_monitor::repository::HttpJobDirectory;
use jobwatch_monitor::service::{InMemoryOperationLog, PageSizePrefs, TracingErrorSink};
use jobwatch_monitor::store::FetchOutcome;
use jobwatch_monitor::{JobMonitor, MonitorServices};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobwatch_monitor=info,jobwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobwatch");

    let config = load_config()?;
    info!(
        "Loaded configuration: registry_url={}, kind={}",
        config.registry_url, config.kind
    );

    let prefs = match &config.prefs_path {
        Some(path) => PageSizePrefs::open(path),
        None => PageSizePrefs::in_memory(),
    };

    let services = MonitorServices {
        directory: Arc::new(HttpJobDirectory::new(
            config.registry_url.clone(),
            config.kind,
        )),
        errors: Arc::new(TracingErrorSink),
        operations: Arc::new(InMemoryOperationLog::new()),
        prefs: Arc::new(prefs),
        gate: ConfirmationGate::new(),
    };

    let (monitor, outcome) = JobMonitor::open(config.monitor_settings(), services).await;
    if outcome == FetchOutcome::Failed {
        monitor.dispose();
        bail!(
            "Failed to load the first page of {} from {}",
            config.kind,
            config.registry_url
        );
    }

    let page = monitor.store().page();
    info!(
        "Watching page {}/{} of {} ({} jobs in total)",
        page.page,
        page.page_count(),
        config.kind,
        page.total
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        _ = watch(&monitor, config.poll_interval) => info!("No active jobs left"),
    }

    monitor.dispose();
    Ok(())
}

/// Loads configuration from environment variables and validates it
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Logs status changes until the monitor stops polling
async fn watch(monitor: &JobMonitor, every: Duration) {
    let mut seen: HashMap<JobId, JobStatus> = HashMap::new();
    let mut ticker = time::interval(every);

    loop {
        ticker.tick().await;

        // Read before the jobs, so the last merge is logged before exiting
        let polling = monitor.refresher().is_polling();
        for job in monitor.store().jobs() {
            if seen.insert(job.id, job.status) != Some(job.status) {
                info!("Job {} is {} (updated {})", job.id, job.status, job.update_time);
            }
        }

        if !polling {
            break;
        }
    }
}
