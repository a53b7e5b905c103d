//! Job directory endpoints

use jobwatch_core::domain::job::{Job, JobId};
use jobwatch_core::domain::page::{JobPage, ListQuery};
use jobwatch_core::dto::job::{ExecHistory, Execution, TaskExecution, UnknownStatus};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::{DirectoryClient, JobKind, TOTAL_COUNT_HEADER};

impl DirectoryClient {
    // =============================================================================
    // Listing
    // =============================================================================

    /// List one page of jobs
    ///
    /// The total number of matching jobs is read from the `X-Total-Count`
    /// header. When the header is missing the number of returned items is
    /// used instead.
    ///
    /// # Arguments
    /// * `query` - Page, page size, filter and sort of the listing
    pub async fn list_jobs(&self, query: &ListQuery) -> Result<JobPage> {
        let url = self.resource_url();
        let response = self
            .client
            .get(&url)
            .query(&query.params())
            .send()
            .await?;

        let response = self.check_status(response).await?;
        let header_total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<usize>().ok());

        let items = match self.kind {
            JobKind::GarbageCollection | JobKind::AuditLogPurge => {
                decode_list::<ExecHistory>(response).await?
            }
            JobKind::Replication => decode_list::<Execution>(response).await?,
            JobKind::WebhookExecutions { .. } => decode_list::<TaskExecution>(response).await?,
        };

        let total_count = header_total.unwrap_or(items.len());
        debug!(
            "Listed {} {} job(s) (page {}, total {})",
            items.len(),
            self.kind,
            query.page,
            total_count
        );

        Ok(JobPage { items, total_count })
    }

    // =============================================================================
    // Single Job
    // =============================================================================

    /// Get a job by ID
    pub async fn get_job(&self, job_id: JobId) -> Result<Job> {
        self.require_stop_support("looking up a single job")?;
        let url = format!("{}/{}", self.resource_url(), job_id);
        let response = self.client.get(&url).send().await?;

        if self.kind == JobKind::Replication {
            convert(self.handle_response::<Execution>(response).await?)
        } else {
            convert(self.handle_response::<ExecHistory>(response).await?)
        }
    }

    /// Request a running or pending job to stop
    ///
    /// The directory acknowledges the request; the job reaches `Stopped`
    /// asynchronously and is observed on a later listing.
    pub async fn stop_job(&self, job_id: JobId) -> Result<()> {
        self.require_stop_support("stopping jobs")?;
        let url = format!("{}/{}", self.resource_url(), job_id);
        let response = self.client.put(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Get the plain-text log of a job
    ///
    /// Replication and webhook executions keep one log per task rather
    /// than per execution, so they have no single log to return.
    pub async fn get_job_log(&self, job_id: JobId) -> Result<String> {
        if matches!(
            self.kind,
            JobKind::Replication | JobKind::WebhookExecutions { .. }
        ) {
            return Err(ClientError::Unsupported {
                kind: self.kind,
                operation: "execution logs",
            });
        }

        let url = format!("{}/{}/log", self.resource_url(), job_id);
        let response = self.client.get(&url).send().await?;

        self.check_status(response)
            .await?
            .text()
            .await
            .map_err(ClientError::from)
    }
}

/// Decodes a listing body; the registry encodes an empty listing as `null`
async fn decode_list<T>(response: reqwest::Response) -> Result<Vec<Job>>
where
    T: DeserializeOwned + TryInto<Job, Error = UnknownStatus>,
{
    let entries: Option<Vec<T>> = response
        .json()
        .await
        .map_err(|e| ClientError::decode("job list", e))?;

    entries.unwrap_or_default().into_iter().map(convert).collect()
}

fn convert<T: TryInto<Job, Error = UnknownStatus>>(entry: T) -> Result<Job> {
    Ok(entry.try_into()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwatch_core::domain::job::JobStatus;
    use jobwatch_core::domain::page::{JobFilter, PageDescriptor, SortOrder};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn history(id: i64, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "job_name": "GARBAGE_COLLECTION",
            "job_kind": "MANUAL",
            "job_parameters": "{\"dry_run\":false}",
            "job_status": status,
            "deleted": false,
            "creation_time": "2024-05-01T10:00:00Z",
            "update_time": "2024-05-01T10:01:00Z"
        })
    }

    #[tokio::test]
    async fn test_list_jobs_reads_total_count_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2.0/system/gc"))
            .and(query_param("page", "2"))
            .and(query_param("page_size", "10"))
            .and(query_param("q", "job_status=~Running"))
            .and(query_param("sort", "-creation_time"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Total-Count", "42")
                    .set_body_json(serde_json::json!([
                        history(1, "Running"),
                        history(2, "Success")
                    ])),
            )
            .mount(&server)
            .await;

        let client = DirectoryClient::new(server.uri(), JobKind::GarbageCollection);
        let mut page = PageDescriptor::new(10);
        page.page = 2;
        page.filter = Some(JobFilter::new("job_status", "Running"));
        page.sort = Some(SortOrder::descending("creation_time"));

        let listed = client.list_jobs(&page.query()).await.unwrap();

        assert_eq!(listed.total_count, 42);
        assert_eq!(listed.items.len(), 2);
        assert_eq!(listed.items[0].status, JobStatus::Running);
        assert_eq!(listed.items[1].status, JobStatus::Success);
    }

    #[tokio::test]
    async fn test_list_jobs_accepts_null_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2.0/system/purgeaudit"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("null", "application/json"))
            .mount(&server)
            .await;

        let client = DirectoryClient::new(server.uri(), JobKind::AuditLogPurge);
        let listed = client
            .list_jobs(&PageDescriptor::default().query())
            .await
            .unwrap();

        assert!(listed.items.is_empty());
        assert_eq!(listed.total_count, 0);
    }

    #[tokio::test]
    async fn test_list_replication_executions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2.0/replication/executions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": 11,
                "policy_id": 2,
                "status": "InProgress",
                "trigger": "manual",
                "start_time": "2024-05-01T10:00:00Z"
            }])))
            .mount(&server)
            .await;

        let client = DirectoryClient::new(server.uri(), JobKind::Replication);
        let listed = client
            .list_jobs(&PageDescriptor::default().query())
            .await
            .unwrap();

        assert_eq!(listed.total_count, 1);
        assert_eq!(listed.items[0].id, JobId(11));
        assert_eq!(listed.items[0].status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_stop_job_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v2.0/system/gc/5"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v2.0/system/gc/6"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such job"))
            .mount(&server)
            .await;

        let client = DirectoryClient::new(server.uri(), JobKind::GarbageCollection);

        assert!(client.stop_job(JobId(5)).await.is_ok());
        let err = client.stop_job(JobId(6)).await.unwrap_err();
        assert!(matches!(err, ClientError::ApiError { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_get_job_and_log() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2.0/system/gc/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(history(9, "Stopped")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2.0/system/gc/9/log"))
            .respond_with(ResponseTemplate::new(200).set_body_string("sweeping blobs\n"))
            .mount(&server)
            .await;

        let client = DirectoryClient::new(server.uri(), JobKind::GarbageCollection);

        let job = client.get_job(JobId(9)).await.unwrap();
        assert_eq!(job.status, JobStatus::Stopped);
        assert_eq!(client.get_job_log(JobId(9)).await.unwrap(), "sweeping blobs\n");
    }

    #[tokio::test]
    async fn test_replication_has_no_execution_log() {
        let client = DirectoryClient::new("http://localhost:1", JobKind::Replication);
        let err = client.get_job_log(JobId(1)).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Unsupported {
                kind: JobKind::Replication,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_status_fails_the_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2.0/system/gc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([history(1, "Running"), history(2, "Exploded")])),
            )
            .mount(&server)
            .await;

        let client = DirectoryClient::new(server.uri(), JobKind::GarbageCollection);
        let err = client
            .list_jobs(&PageDescriptor::default().query())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::UnknownStatus(UnknownStatus(ref raw)) if raw == "Exploded"
        ));
    }

    #[tokio::test]
    async fn test_list_webhook_executions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2.0/projects/3/webhook/policies/7/executions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Total-Count", "9")
                    .set_body_json(serde_json::json!([{
                        "id": 40,
                        "vendor_type": "WEBHOOK",
                        "vendor_id": 7,
                        "status": "Running",
                        "metrics": { "task_count": 1, "running_task_count": 1 },
                        "trigger": "EVENT",
                        "start_time": "2024-05-01T10:00:00Z"
                    }])),
            )
            .mount(&server)
            .await;

        let kind = JobKind::WebhookExecutions {
            project_id: 3,
            policy_id: 7,
        };
        let client = DirectoryClient::new(server.uri(), kind);
        let listed = client
            .list_jobs(&PageDescriptor::default().query())
            .await
            .unwrap();

        assert_eq!(listed.total_count, 9);
        assert_eq!(listed.items[0].id, JobId(40));
        assert_eq!(listed.items[0].status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_webhook_executions_cannot_be_stopped() {
        let server = MockServer::start().await;
        let kind = JobKind::WebhookExecutions {
            project_id: 3,
            policy_id: 7,
        };
        let client = DirectoryClient::new(server.uri(), kind);

        let err = client.stop_job(JobId(40)).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Unsupported {
                operation: "stopping jobs",
                ..
            }
        ));
        assert!(matches!(
            client.get_job(JobId(40)).await,
            Err(ClientError::Unsupported { .. })
        ));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
