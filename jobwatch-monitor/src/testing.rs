//! Scripted job directory for unit tests

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobwatch_client::ClientError;
use jobwatch_core::domain::job::{Job, JobId, JobStatus};
use jobwatch_core::domain::page::{JobPage, ListQuery};
use tokio::sync::Semaphore;

use crate::error::{MonitorError, Result};
use crate::repository::JobDirectory;
use crate::service::{BufferedErrorSink, PageSizePrefs, ViewKey};
use crate::store::JobStore;

/// Builds a job with fixed timestamps
pub(crate) fn job(id: i64, status: JobStatus) -> Job {
    let at: DateTime<Utc> = DateTime::from_timestamp(1_767_225_600, 0).unwrap();
    Job {
        id: JobId(id),
        status,
        parameters: serde_json::Value::Null,
        creation_time: at,
        update_time: at,
    }
}

/// Store over `directory` with in-memory preferences and a buffered sink
pub(crate) fn store_with(directory: Arc<FakeDirectory>) -> (JobStore, BufferedErrorSink) {
    let sink = BufferedErrorSink::new();
    let store = JobStore::new(
        ViewKey::GcHistory,
        directory,
        Arc::new(sink.clone()),
        Arc::new(PageSizePrefs::in_memory()),
        15,
    );
    (store, sink)
}

/// In-memory job directory
///
/// Listings page through `jobs` unless a scripted response is queued.
/// Stops flip the job to `Stopped` unless the job was marked as failing.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    jobs: Mutex<Vec<Job>>,
    scripted: Mutex<VecDeque<std::result::Result<JobPage, String>>>,
    list_delay: Mutex<Duration>,
    list_calls: AtomicUsize,
    queries: Mutex<Vec<ListQuery>>,
    stop_calls: Mutex<Vec<JobId>>,
    failing_stops: Mutex<HashSet<JobId>>,
    stop_permits: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeDirectory {
    pub(crate) fn with_jobs(jobs: Vec<Job>) -> Arc<Self> {
        let directory = Self::default();
        *directory.jobs.lock().unwrap() = jobs;
        Arc::new(directory)
    }

    /// Changes the status the directory reports for `id`
    pub(crate) fn set_status(&self, id: JobId, status: JobStatus) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|job| job.id == id) {
            job.status = status;
        }
    }

    /// Queues a listing response served before the backing jobs
    pub(crate) fn script_list(&self, page: JobPage) {
        self.scripted.lock().unwrap().push_back(Ok(page));
    }

    pub(crate) fn fail_next_list(&self, message: &str) {
        self.scripted.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub(crate) fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_query(&self) -> Option<ListQuery> {
        self.queries.lock().unwrap().last().cloned()
    }

    pub(crate) fn stop_calls(&self) -> Vec<JobId> {
        self.stop_calls.lock().unwrap().clone()
    }

    /// Makes every stop request for `id` fail with a conflict
    pub(crate) fn fail_stop(&self, id: JobId) {
        self.failing_stops.lock().unwrap().insert(id);
    }

    /// Holds every stop request until a permit is added to the returned semaphore
    pub(crate) fn hold_stops(&self) -> Arc<Semaphore> {
        let permits = Arc::new(Semaphore::new(0));
        *self.stop_permits.lock().unwrap() = Some(Arc::clone(&permits));
        permits
    }
}

#[async_trait]
impl JobDirectory for FakeDirectory {
    async fn list_jobs(&self, query: &ListQuery) -> Result<JobPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        let scripted = self.scripted.lock().unwrap().pop_front();
        let delay = *self.list_delay.lock().unwrap();

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match scripted {
            Some(Ok(page)) => Ok(page),
            Some(Err(message)) => Err(MonitorError::Fetch {
                page: query.page,
                source: ClientError::api_error(503, message),
            }),
            None => {
                let jobs = self.jobs.lock().unwrap();
                let start = (query.page.max(1) - 1) * query.page_size;
                Ok(JobPage {
                    items: jobs.iter().skip(start).take(query.page_size).cloned().collect(),
                    total_count: jobs.len(),
                })
            }
        }
    }

    async fn stop_job(&self, job_id: JobId) -> Result<()> {
        self.stop_calls.lock().unwrap().push(job_id);

        let permits = self.stop_permits.lock().unwrap().clone();
        if let Some(permits) = permits {
            permits.acquire().await.unwrap().forget();
        }

        if self.failing_stops.lock().unwrap().contains(&job_id) {
            return Err(MonitorError::Stop {
                job: job_id,
                source: ClientError::api_error(409, "job is not running"),
            });
        }
        self.set_status(job_id, JobStatus::Stopped);
        Ok(())
    }
}
