//! Job monitor
//!
//! Wires one store, its refresher and its cancel executor into a single
//! live view. Every user-driven reload goes through the monitor so the
//! refresher is re-armed whenever a fetch brings active jobs back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use jobwatch_client::JobKind;
use jobwatch_core::domain::job::Job;
use jobwatch_core::domain::page::{DEFAULT_PAGE_SIZE, JobFilter, SortOrder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cancel::{BatchOutcome, CancelExecutor};
use crate::gate::{
    ConfirmationButtons, ConfirmationGate, ConfirmationMessage, ConfirmationState, TargetTag,
};
use crate::repository::JobDirectory;
use crate::scheduler::{POLL_INTERVAL, Refresher};
use crate::service::{ErrorSink, OperationLog, PageSizePrefs, ViewKey};
use crate::store::{FetchOutcome, JobStore, StoreSnapshot};

/// Per-view settings of a monitor
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub view: ViewKey,
    /// Confirmation target of stop requests; `None` for list-only views
    pub target: Option<TargetTag>,
    pub poll_interval: Duration,
    pub default_page_size: usize,
    /// Name of the operation records published for stop requests
    pub operation_name: String,
    /// Title of the stop confirmation
    pub confirm_title: String,
}

impl MonitorSettings {
    /// Settings for the history view of one job directory
    pub fn for_kind(kind: JobKind) -> Self {
        let (view, target, operation_name, confirm_title) = match kind {
            JobKind::GarbageCollection => (
                ViewKey::GcHistory,
                Some(TargetTag::StopGc),
                "Stop GC",
                "Stop garbage collection",
            ),
            JobKind::AuditLogPurge => (
                ViewKey::AuditLogPurgeHistory,
                Some(TargetTag::StopPurge),
                "Stop log rotation",
                "Stop audit log purge",
            ),
            JobKind::Replication => (
                ViewKey::ReplicationExecutions,
                Some(TargetTag::StopExecutions),
                "Stop replication",
                "Stop replication executions",
            ),
            JobKind::WebhookExecutions { .. } => (
                ViewKey::WebhookExecutions,
                None,
                "Stop webhook execution",
                "Stop webhook executions",
            ),
        };

        Self {
            view,
            target,
            poll_interval: POLL_INTERVAL,
            default_page_size: DEFAULT_PAGE_SIZE,
            operation_name: operation_name.to_string(),
            confirm_title: confirm_title.to_string(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }
}

/// Collaborators shared by the monitors of one application
#[derive(Clone)]
pub struct MonitorServices {
    pub directory: Arc<dyn JobDirectory>,
    pub errors: Arc<dyn ErrorSink>,
    pub operations: Arc<dyn OperationLog>,
    pub prefs: Arc<PageSizePrefs>,
    pub gate: ConfirmationGate,
}

/// How a stop request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopRequestOutcome {
    /// No selected job could be stopped, nothing was asked
    NothingToStop,
    /// The user declined, or the monitor went away while asking
    Canceled,
    /// The user confirmed and the batch ran
    Completed(BatchOutcome),
    /// The view's directory cannot stop jobs, nothing was asked
    Unsupported,
}

/// One live, paginated view of a job directory
pub struct JobMonitor {
    settings: MonitorSettings,
    store: Arc<JobStore>,
    refresher: Refresher,
    executor: CancelExecutor,
    gate: ConfirmationGate,
    listener: Mutex<Option<CancellationToken>>,
    disposed: AtomicBool,
}

impl JobMonitor {
    /// Builds the view and loads its first page
    ///
    /// The outcome of the first load is returned next to the view. A failed
    /// load has already been reported to the error sink.
    pub async fn open(
        settings: MonitorSettings,
        services: MonitorServices,
    ) -> (Arc<Self>, FetchOutcome) {
        let store = Arc::new(JobStore::new(
            settings.view,
            services.directory,
            services.errors,
            services.prefs,
            settings.default_page_size,
        ));
        let refresher = Refresher::with_interval(Arc::clone(&store), settings.poll_interval);
        let executor = CancelExecutor::new(Arc::clone(&store), services.operations)
            .with_operation_name(settings.operation_name.clone());

        info!("Opening {} monitor", settings.view);

        let monitor = Arc::new(Self {
            settings,
            store,
            refresher,
            executor,
            gate: services.gate,
            listener: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });
        let outcome = monitor.refresh().await;
        (monitor, outcome)
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    pub fn executor(&self) -> &CancelExecutor {
        &self.executor
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    fn arm(&self, outcome: FetchOutcome) -> FetchOutcome {
        self.refresher.after_fetch(outcome);
        outcome
    }

    // =============================================================================
    // User-driven reloads
    // =============================================================================

    /// Reloads the current page
    pub async fn refresh(&self) -> FetchOutcome {
        let outcome = self.store.replace_fetch().await;
        self.arm(outcome)
    }

    pub async fn set_page(&self, page: usize) -> FetchOutcome {
        let outcome = self.store.set_page(page).await;
        self.arm(outcome)
    }

    pub async fn set_page_size(&self, page_size: usize) -> FetchOutcome {
        let outcome = self.store.set_page_size(page_size).await;
        self.arm(outcome)
    }

    pub async fn set_sort(&self, sort: Option<SortOrder>) -> FetchOutcome {
        let outcome = self.store.set_sort(sort).await;
        self.arm(outcome)
    }

    pub async fn set_filter(&self, filter: Option<JobFilter>) -> FetchOutcome {
        let outcome = self.store.set_filter(filter).await;
        self.arm(outcome)
    }

    // =============================================================================
    // Stopping jobs
    // =============================================================================

    /// Asks for confirmation, then stops the selected active jobs
    ///
    /// The request carries its own correlation id, so two monitors asking
    /// at the same time each get their own answer.
    pub async fn request_stop(&self) -> StopRequestOutcome {
        let Some(target) = self.settings.target else {
            return StopRequestOutcome::Unsupported;
        };

        let jobs: Vec<Job> = self
            .store
            .selected_jobs()
            .into_iter()
            .filter(Job::is_active)
            .collect();
        if jobs.is_empty() {
            return StopRequestOutcome::NothingToStop;
        }

        let ids: Vec<String> = jobs.iter().map(|job| job.id.to_string()).collect();
        let message = ConfirmationMessage::new(
            target,
            jobs,
            self.settings.confirm_title.clone(),
            format!("Do you want to stop {}?", ids.join(", ")),
            ConfirmationButtons::StopCancel,
        );
        let payload = message.payload.clone();

        let answer = self.gate.request(message).outcome().await;
        if answer != ConfirmationState::Confirmed || self.is_disposed() {
            debug!("Stop request for {} not confirmed", self.settings.view);
            return StopRequestOutcome::Canceled;
        }

        StopRequestOutcome::Completed(self.stop_jobs(&payload).await)
    }

    /// Stops `jobs` without asking, then reloads and re-arms polling
    pub async fn stop_jobs(&self, jobs: &[Job]) -> BatchOutcome {
        let outcome = self.executor.cancel_all(jobs).await;
        if let Some(refresh) = outcome.refresh {
            self.arm(refresh);
        }
        outcome
    }

    /// Reacts to broadcast confirmations for this view's target
    ///
    /// Each `Confirmed` message has its payload stopped. The listener ends
    /// when the monitor is disposed or dropped. Returns false if a listener
    /// is already running or the view cannot stop jobs.
    pub fn listen(self: &Arc<Self>) -> bool {
        let Some(target) = self.settings.target else {
            return false;
        };
        if self.is_disposed() {
            return false;
        }

        let cancel = {
            let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
            if listener.is_some() {
                return false;
            }
            let cancel = CancellationToken::new();
            *listener = Some(cancel.clone());
            cancel
        };

        let mut subscription = self.gate.subscribe(target);
        let monitor = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    message = subscription.next_confirmed() => message,
                };
                let Some(message) = message else { break };
                let Some(monitor) = monitor.upgrade() else { break };
                if monitor.is_disposed() {
                    break;
                }
                debug!("Confirmed stop of {} job(s)", message.payload.len());
                monitor.stop_jobs(&message.payload).await;
            }
        });
        true
    }

    // =============================================================================
    // Lifecycle
    // =============================================================================

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Tears the view down; safe to call more than once
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.refresher.dispose();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = listener {
            cancel.cancel();
        }
        self.store.dispose();
        info!("Closed {} monitor", self.settings.view);
    }
}

impl Drop for JobMonitor {
    fn drop(&mut self) {
        self.dispose();
    }
}
