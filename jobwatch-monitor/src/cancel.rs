//! Batch cancel executor
//!
//! Stops a set of jobs with one request per job, all issued concurrently.
//! Every request gets its own operation record and its own error report;
//! one failure never aborts the others. Once all of them have settled the
//! store is reloaded with a replace fetch.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use jobwatch_core::domain::job::{Job, JobId};
use tracing::{debug, info, warn};

use crate::service::{OperationLog, OperationRecord, OperationState};
use crate::store::{FetchOutcome, JobStore};

/// Operation name used when none is configured
pub const DEFAULT_OPERATION_NAME: &str = "Stop job";

/// What happened to each job of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub stopped: Vec<JobId>,
    pub failed: Vec<JobId>,
    /// Jobs left alone because they had already reached a terminal status
    pub skipped: Vec<JobId>,
    /// Result of the reload issued after the batch, if any
    pub refresh: Option<FetchOutcome>,
}

/// Keeps the in-progress counter balanced, even if a batch is dropped mid-flight
struct BatchGuard<'a>(&'a AtomicUsize);

impl<'a> BatchGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Issues stop requests for the jobs of one store
pub struct CancelExecutor {
    store: Arc<JobStore>,
    operations: Arc<dyn OperationLog>,
    operation_name: String,
    in_flight: AtomicUsize,
}

impl CancelExecutor {
    pub fn new(store: Arc<JobStore>, operations: Arc<dyn OperationLog>) -> Self {
        Self {
            store,
            operations,
            operation_name: DEFAULT_OPERATION_NAME.to_string(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Sets the name under which operation records are published
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = name.into();
        self
    }

    /// Whether a batch is still waiting for stop responses
    pub fn in_progress(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Stops every job of `jobs` that is still active
    ///
    /// Eligibility is checked here, against the freshest known status of
    /// each job, not trusted from the caller. When nothing is eligible no
    /// request and no reload is issued.
    pub async fn cancel_all(&self, jobs: &[Job]) -> BatchOutcome {
        let (eligible, skipped): (Vec<JobId>, Vec<JobId>) = jobs
            .iter()
            .map(|job| self.store.job(job.id).unwrap_or_else(|| job.clone()))
            .fold((Vec::new(), Vec::new()), |(mut eligible, mut skipped), job| {
                if job.is_active() {
                    eligible.push(job.id);
                } else {
                    skipped.push(job.id);
                }
                (eligible, skipped)
            });

        if !skipped.is_empty() {
            debug!("Skipping {} job(s) that already finished", skipped.len());
        }

        if eligible.is_empty() {
            return BatchOutcome {
                stopped: Vec::new(),
                failed: Vec::new(),
                skipped,
                refresh: None,
            };
        }

        info!("Stopping {} job(s)", eligible.len());

        let results = {
            let _guard = BatchGuard::enter(&self.in_flight);
            join_all(eligible.iter().map(|id| self.stop_one(*id))).await
        };

        let (stopped, failed): (Vec<_>, Vec<_>) = eligible
            .into_iter()
            .zip(results)
            .partition(|(_, ok)| *ok);
        let stopped: Vec<JobId> = stopped.into_iter().map(|(id, _)| id).collect();
        let failed: Vec<JobId> = failed.into_iter().map(|(id, _)| id).collect();

        if failed.is_empty() {
            info!("Stopped {} job(s)", stopped.len());
        } else {
            warn!(
                "Stopped {} job(s), {} stop request(s) failed",
                stopped.len(),
                failed.len()
            );
        }

        let refresh = self.store.replace_fetch().await;

        BatchOutcome {
            stopped,
            failed,
            skipped,
            refresh: Some(refresh),
        }
    }

    /// Issues one stop request; returns whether it succeeded
    async fn stop_one(&self, id: JobId) -> bool {
        self.operations.publish(OperationRecord::new(
            &self.operation_name,
            id,
            OperationState::Progressing,
        ));

        match self.store.directory().stop_job(id).await {
            Ok(()) => {
                debug!("Stop request for job {} accepted", id);
                self.operations.publish(OperationRecord::new(
                    &self.operation_name,
                    id,
                    OperationState::Success,
                ));
                true
            }
            Err(e) => {
                self.operations.publish(
                    OperationRecord::new(&self.operation_name, id, OperationState::Failure)
                        .with_detail(e.to_string()),
                );
                self.store.errors().report(&self.operation_name, &e);
                false
            }
        }
    }
}
