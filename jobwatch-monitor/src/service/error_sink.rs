//! Error sink service
//!
//! Fetch and stop failures never abort a view. They are handed to an
//! error sink, which decides how to show them: the watcher binary logs
//! them, an interactive front end drains them into non-blocking messages.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use crate::error::MonitorError;

/// Service trait for reporting recoverable errors
pub trait ErrorSink: Send + Sync {
    /// Reports one error
    ///
    /// # Arguments
    /// * `context` - Short description of the failed operation
    /// * `error` - The error itself
    fn report(&self, context: &str, error: &MonitorError);
}

/// Error sink that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, context: &str, error: &MonitorError) {
        error!("{}: {}", context, error);
    }
}

/// Error sink that keeps rendered messages until they are drained
#[derive(Clone, Default)]
pub struct BufferedErrorSink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl BufferedErrorSink {
    /// Creates a new, empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all pending messages and clears the buffer
    pub fn drain(&self) -> Vec<String> {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.drain(..).collect()
    }

    /// Number of messages waiting to be drained
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorSink for BufferedErrorSink {
    fn report(&self, context: &str, error: &MonitorError) {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.push(format!("{}: {}", context, error));
    }
}
