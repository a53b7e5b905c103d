//! Job directory repository
//!
//! Handles communication with the registry for the job operations a
//! monitor needs:
//! - Listing one page of jobs with its total count
//! - Requesting a job to stop

use async_trait::async_trait;
use jobwatch_client::{DirectoryClient, JobKind};
use jobwatch_core::domain::job::JobId;
use jobwatch_core::domain::page::{JobPage, ListQuery};

use crate::error::{MonitorError, Result};

/// Repository trait for the job directory consumed by a monitor
#[async_trait]
pub trait JobDirectory: Send + Sync {
    /// Lists one page of jobs
    ///
    /// # Arguments
    /// * `query` - Page, page size, filter and sort of the listing
    ///
    /// # Returns
    /// The jobs of the page and the total number of matching jobs
    async fn list_jobs(&self, query: &ListQuery) -> Result<JobPage>;

    /// Requests one job to stop
    ///
    /// # Arguments
    /// * `job_id` - The ID of the job to stop
    async fn stop_job(&self, job_id: JobId) -> Result<()>;
}

/// HTTP implementation of JobDirectory
pub struct HttpJobDirectory {
    client: DirectoryClient,
}

impl HttpJobDirectory {
    /// Creates a new HTTP job directory
    ///
    /// # Arguments
    /// * `registry_url` - Base URL of the registry (e.g., "http://localhost:8080")
    /// * `kind` - Which job directory to monitor
    pub fn new(registry_url: impl Into<String>, kind: JobKind) -> Self {
        Self {
            client: DirectoryClient::new(registry_url, kind),
        }
    }

    /// Wraps an already configured client
    pub fn from_client(client: DirectoryClient) -> Self {
        Self { client }
    }

    pub fn kind(&self) -> JobKind {
        self.client.kind()
    }
}

#[async_trait]
impl JobDirectory for HttpJobDirectory {
    async fn list_jobs(&self, query: &ListQuery) -> Result<JobPage> {
        self.client
            .list_jobs(query)
            .await
            .map_err(|source| MonitorError::Fetch {
                page: query.page,
                source,
            })
    }

    async fn stop_job(&self, job_id: JobId) -> Result<()> {
        self.client
            .stop_job(job_id)
            .await
            .map_err(|source| MonitorError::Stop {
                job: job_id,
                source,
            })
    }
}
