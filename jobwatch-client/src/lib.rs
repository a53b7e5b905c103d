//! Jobwatch HTTP Client
//!
//! A small, type-safe HTTP client for the job history endpoints of a
//! container registry's v2.0 API.
//!
//! One [`DirectoryClient`] talks to one job directory, selected by
//! [`JobKind`]: garbage-collection history, audit-log-purge history,
//! replication executions or the executions of one webhook policy. The
//! directories encode their entries differently; the client hides that
//! difference behind the shared [`jobwatch_core::domain::job::Job`] shape.
//! Webhook executions can only be listed, every other operation on them
//! fails with [`ClientError::Unsupported`].
//!
//! # Example
//!
//! ```no_run
//! use jobwatch_client::{DirectoryClient, JobKind};
//! use jobwatch_core::domain::page::PageDescriptor;
//!
//! # async fn example() -> jobwatch_client::Result<()> {
//! let client = DirectoryClient::new("http://localhost:8080", JobKind::GarbageCollection);
//! let page = client.list_jobs(&PageDescriptor::default().query()).await?;
//! println!("{} of {} jobs", page.items.len(), page.total_count);
//! # Ok(())
//! # }
//! ```

pub mod error;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// Path prefix of the registry API
const API_PREFIX: &str = "/api/v2.0";

/// Header carrying the total number of entries of a listing
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Which job directory a client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    GarbageCollection,
    AuditLogPurge,
    Replication,
    WebhookExecutions { project_id: i64, policy_id: i64 },
}

impl JobKind {
    /// Resource path of the directory, relative to the API prefix
    pub fn path(self) -> String {
        match self {
            JobKind::GarbageCollection => "/system/gc".to_string(),
            JobKind::AuditLogPurge => "/system/purgeaudit".to_string(),
            JobKind::Replication => "/replication/executions".to_string(),
            JobKind::WebhookExecutions {
                project_id,
                policy_id,
            } => format!(
                "/projects/{}/webhook/policies/{}/executions",
                project_id, policy_id
            ),
        }
    }

    /// Whether single entries of the directory can be fetched and stopped
    pub fn supports_stop(self) -> bool {
        !matches!(self, JobKind::WebhookExecutions { .. })
    }

    /// Parses the short names used in configuration
    ///
    /// Webhook executions need a project and a policy, so `webhook` is not
    /// accepted here.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gc" | "garbage-collection" => Some(JobKind::GarbageCollection),
            "purge" | "audit-log-purge" => Some(JobKind::AuditLogPurge),
            "replication" => Some(JobKind::Replication),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::GarbageCollection => write!(f, "gc"),
            JobKind::AuditLogPurge => write!(f, "purge"),
            JobKind::Replication => write!(f, "replication"),
            JobKind::WebhookExecutions { .. } => write!(f, "webhook"),
        }
    }
}

/// HTTP client for one job directory of the registry API
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    /// Base URL of the registry (e.g., "http://localhost:8080")
    base_url: String,
    /// Directory this client lists and stops jobs in
    kind: JobKind,
    /// HTTP client instance
    client: Client,
}

impl DirectoryClient {
    /// Create a new directory client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the registry (e.g., "http://localhost:8080")
    /// * `kind` - The job directory to talk to
    pub fn new(base_url: impl Into<String>, kind: JobKind) -> Self {
        Self::with_client(base_url, kind, Client::new())
    }

    /// Create a new directory client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, kind: JobKind, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            kind,
            client,
        }
    }

    /// Get the base URL of the registry
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the directory this client talks to
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Full URL of the directory resource
    fn resource_url(&self) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, self.kind.path())
    }

    /// Fails unless single entries of the directory are addressable
    fn require_stop_support(&self, operation: &'static str) -> Result<()> {
        if self.kind.supports_stop() {
            Ok(())
        } else {
            Err(ClientError::Unsupported {
                kind: self.kind,
                operation,
            })
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Fail with an API error unless the response has a success status
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        self.check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::decode("job", e))
    }

    /// Handle an API response that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        self.check_status(response).await.map(|_| ())
    }
}
