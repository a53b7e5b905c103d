//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a job, unique within its directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        JobId(id)
    }
}

/// One server-side unit of work as observed by a monitor
///
/// The `id` never changes. Between two refreshes only `status`,
/// `update_time` and `parameters` are expected to move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub creation_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Job {
    /// Whether this job may still change state
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Copies the fields a merge refresh owns from `fresh` into `self`
    pub fn absorb(&mut self, fresh: &Job) {
        self.status = fresh.status;
        self.update_time = fresh.update_time;
        self.parameters = fresh.parameters.clone();
    }
}

/// Job execution status
///
/// The registry reports these under a few historical spellings, all of
/// which are accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(alias = "Scheduled", alias = "pending")]
    Pending,
    #[serde(alias = "InProgress", alias = "running")]
    Running,
    #[serde(alias = "Finished", alias = "Succeed", alias = "success")]
    Success,
    #[serde(alias = "Error", alias = "error")]
    Failed,
    #[serde(alias = "stopped")]
    Stopped,
}

impl JobStatus {
    /// Terminal statuses are not expected to change any further
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Stopped
        )
    }

    /// Parses a status string as reported by the registry
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Pending" | "Scheduled" | "pending" => Some(JobStatus::Pending),
            "Running" | "InProgress" | "running" => Some(JobStatus::Running),
            "Success" | "Finished" | "Succeed" | "success" => Some(JobStatus::Success),
            "Failed" | "Error" | "error" => Some(JobStatus::Failed),
            "Stopped" | "stopped" => Some(JobStatus::Stopped),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Success => write!(f, "Success"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::Stopped => write!(f, "Stopped"),
        }
    }
}
