//! Error types for the jobwatch client

use jobwatch_core::dto::job::UnknownStatus;
use thiserror::Error;

use crate::JobKind;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to a job directory
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The registry answered with a non-success status
    #[error("Registry returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    /// The body did not match the directory's envelope
    #[error("Failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    /// An entry carried a status no monitor knows how to classify
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatus),

    /// The directory has no endpoint for the operation
    #[error("The {kind} directory does not support {operation}")]
    Unsupported {
        kind: JobKind,
        operation: &'static str,
    },
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn decode(what: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            message: error.to_string(),
        }
    }
}
