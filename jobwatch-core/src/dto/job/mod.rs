//! Job DTOs for the registry API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobId, JobStatus};

/// Status string the registry reported that maps to no known status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown job status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// Schedule attached to a history entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleObj {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub cron: Option<String>,
}

/// Garbage-collection and audit-log-purge history entry
///
/// `job_parameters` travels as a JSON document encoded in a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecHistory {
    pub id: i64,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub job_kind: Option<String>,
    #[serde(default)]
    pub job_parameters: Option<String>,
    #[serde(default)]
    pub schedule: Option<ScheduleObj>,
    pub job_status: String,
    #[serde(default)]
    pub deleted: bool,
    pub creation_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl TryFrom<ExecHistory> for Job {
    type Error = UnknownStatus;

    fn try_from(history: ExecHistory) -> Result<Self, Self::Error> {
        let status = JobStatus::parse(&history.job_status)
            .ok_or_else(|| UnknownStatus(history.job_status.clone()))?;

        let parameters = match history.job_parameters {
            Some(raw) if !raw.is_empty() => {
                serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
            }
            _ => serde_json::Value::Null,
        };

        Ok(Job {
            id: JobId(history.id),
            status,
            parameters,
            creation_time: history.creation_time,
            update_time: history.update_time,
        })
    }
}

/// Replication execution entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    #[serde(default)]
    pub policy_id: Option<i64>,
    pub status: String,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub failed: i64,
    #[serde(default)]
    pub succeed: i64,
    #[serde(default)]
    pub in_progress: i64,
    #[serde(default)]
    pub stopped: i64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl TryFrom<Execution> for Job {
    type Error = UnknownStatus;

    fn try_from(execution: Execution) -> Result<Self, Self::Error> {
        let status = JobStatus::parse(&execution.status)
            .ok_or_else(|| UnknownStatus(execution.status.clone()))?;

        let parameters = serde_json::json!({
            "policy_id": execution.policy_id,
            "trigger": execution.trigger,
            "total": execution.total,
            "failed": execution.failed,
            "succeed": execution.succeed,
            "in_progress": execution.in_progress,
            "stopped": execution.stopped,
        });

        Ok(Job {
            id: JobId(execution.id),
            status,
            parameters,
            creation_time: execution.start_time,
            update_time: execution.end_time.unwrap_or(execution.start_time),
        })
    }
}

/// Task counters of a generic execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    #[serde(default)]
    pub task_count: i64,
    #[serde(default)]
    pub success_task_count: i64,
    #[serde(default)]
    pub error_task_count: i64,
    #[serde(default)]
    pub pending_task_count: i64,
    #[serde(default)]
    pub running_task_count: i64,
    #[serde(default)]
    pub scheduled_task_count: i64,
    #[serde(default)]
    pub stopped_task_count: i64,
}

/// Generic task-manager execution, as listed for a webhook policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: i64,
    #[serde(default)]
    pub vendor_type: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<i64>,
    pub status: String,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub metrics: Option<ExecutionMetrics>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub extra_attrs: Option<serde_json::Value>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl TryFrom<TaskExecution> for Job {
    type Error = UnknownStatus;

    fn try_from(execution: TaskExecution) -> Result<Self, Self::Error> {
        let status = JobStatus::parse(&execution.status)
            .ok_or_else(|| UnknownStatus(execution.status.clone()))?;

        let metrics = execution.metrics.unwrap_or_default();
        let parameters = serde_json::json!({
            "vendor_type": execution.vendor_type,
            "vendor_id": execution.vendor_id,
            "trigger": execution.trigger,
            "status_message": execution.status_message,
            "event_type": execution
                .extra_attrs
                .as_ref()
                .and_then(|attrs| attrs.get("event_type"))
                .cloned(),
            "task_count": metrics.task_count,
            "success_task_count": metrics.success_task_count,
            "error_task_count": metrics.error_task_count,
            "running_task_count": metrics.running_task_count,
        });

        Ok(Job {
            id: JobId(execution.id),
            status,
            parameters,
            creation_time: execution.start_time,
            update_time: execution.end_time.unwrap_or(execution.start_time),
        })
    }
}
