//! Error types for the monitor engine

use jobwatch_client::ClientError;
use jobwatch_core::domain::job::JobId;
use thiserror::Error;

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors surfaced by a monitor
///
/// None of these are fatal to a view: they are reported to an
/// [`crate::service::ErrorSink`] and the view keeps its previous state.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A page could not be listed
    #[error("Failed to fetch page {page}: {source}")]
    Fetch {
        page: usize,
        #[source]
        source: ClientError,
    },

    /// A stop request for one job failed
    #[error("Failed to stop job {job}: {source}")]
    Stop {
        job: JobId,
        #[source]
        source: ClientError,
    },

    /// The page-size preference store could not be read or written
    #[error("Preference store error: {0}")]
    Preferences(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
