//! Operation log service
//!
//! Records the progress of user-triggered operations (one record per stop
//! request) so a front end can show a running history of what was asked
//! and how it ended.

use chrono::{DateTime, Utc};
use jobwatch_core::domain::job::JobId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Number of records kept by default
pub const DEFAULT_OPERATION_CAPACITY: usize = 200;

/// Progress of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    Progressing,
    Success,
    Failure,
}

/// One step of an operation on one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub name: String,
    pub target: JobId,
    pub state: OperationState,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl OperationRecord {
    pub fn new(name: impl Into<String>, target: JobId, state: OperationState) -> Self {
        Self {
            name: name.into(),
            target,
            state,
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Service for collecting operation records
pub trait OperationLog: Send + Sync {
    /// Appends a record
    fn publish(&self, record: OperationRecord);

    /// Returns all buffered records and clears the buffer
    fn drain(&self) -> Vec<OperationRecord>;
}

/// In-memory implementation of OperationLog
///
/// Bounded: once `capacity` records are held the oldest one is dropped.
#[derive(Clone)]
pub struct InMemoryOperationLog {
    buffer: Arc<Mutex<VecDeque<OperationRecord>>>,
    capacity: usize,
}

impl InMemoryOperationLog {
    /// Creates a new in-memory operation log
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_OPERATION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryOperationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLog for InMemoryOperationLog {
    fn publish(&self, record: OperationRecord) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(record);
    }

    fn drain(&self) -> Vec<OperationRecord> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.drain(..).collect()
    }
}
