//! Job-based search API: submit, poll, fetch.

use std::fmt;
use std::time::Duration;

use criblsync_records::{parse_ndjson, ResultRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::endpoints::BearerToken;
use crate::error::{ClientError, Result};
use crate::http::{CloudClient, Items};

pub const DEFAULT_EARLIEST: &str = "-1h";
pub const DEFAULT_LATEST: &str = "now";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub earliest: String,
    pub latest: String,
    pub sample_rate: u32,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            earliest: DEFAULT_EARLIEST.to_string(),
            latest: DEFAULT_LATEST.to_string(),
            sample_rate: 1,
        }
    }

    /// `cribl dataset="<dataset>" | limit <limit>`
    pub fn for_dataset(dataset: &str, limit: usize) -> Self {
        Self::new(format!("cribl dataset=\"{dataset}\" | limit {limit}"))
    }

    pub fn with_range(mut self, earliest: impl Into<String>, latest: impl Into<String>) -> Self {
        self.earliest = earliest.into();
        self.latest = latest.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done,
    Completed,
    Failed,
    /// Any other non-terminal status string (`queued`, `new`, ...).
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => JobStatus::Running,
            "done" => JobStatus::Done,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || matches!(self, JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => f.write_str("running"),
            JobStatus::Done => f.write_str("done"),
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Failed => f.write_str("failed"),
            JobStatus::Other(raw) => f.write_str(raw),
        }
    }
}

/// Fixed-interval status polling bounded by an attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobItem {
    id: Option<String>,
    status: Option<String>,
}

/// Search jobs of one workspace, authorized with one token.
pub struct SearchJobs<'a> {
    client: &'a CloudClient,
    token: &'a BearerToken,
    workspace: &'a str,
}

impl<'a> SearchJobs<'a> {
    pub fn new(client: &'a CloudClient, token: &'a BearerToken, workspace: &'a str) -> Self {
        Self {
            client,
            token,
            workspace,
        }
    }

    /// Submits the query and returns the new job id.
    pub async fn submit(&self, request: &SearchRequest) -> Result<String> {
        let url = self
            .client
            .endpoints()
            .scoped_url(self.workspace, &["search", "jobs"])?;
        let builder = self
            .client
            .authorized(self.client.http().post(url), self.token)
            .json(request);

        let context = "submit search job";
        let items: Items<JobItem> = self.client.send_json(builder, context).await?;
        let job_id = items
            .into_first(context)?
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ClientError::malformed(context, "missing job 'id'"))?;

        info!(job_id = %job_id, query = %request.query, "search job submitted");
        Ok(job_id)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatus> {
        let url = self
            .client
            .endpoints()
            .scoped_url(self.workspace, &["search", "jobs", job_id])?;
        let builder = self.client.authorized(self.client.http().get(url), self.token);

        let context = format!("fetch status of search job {job_id}");
        let items: Items<JobItem> = self.client.send_json(builder, &context).await?;
        let status = items
            .into_first(&context)?
            .status
            .ok_or_else(|| ClientError::malformed(&context, "missing job 'status'"))?;

        Ok(JobStatus::parse(&status))
    }

    /// Polls until the job reaches a terminal state.
    ///
    /// Returns [`ClientError::JobFailed`] for a failed job and [`ClientError::PollTimeout`]
    /// once `policy.max_attempts` checks pass without a terminal state.
    pub async fn wait_for_completion(&self, job_id: &str, policy: &PollPolicy) -> Result<JobStatus> {
        for attempt in 1..=policy.max_attempts {
            let status = self.status(job_id).await?;
            debug!(job_id, attempt, status = %status, "search job status");

            if status.is_success() {
                info!(job_id, attempt, status = %status, "search job finished");
                return Ok(status);
            }
            if status == JobStatus::Failed {
                return Err(ClientError::JobFailed {
                    job_id: job_id.to_string(),
                });
            }

            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        Err(ClientError::PollTimeout {
            job_id: job_id.to_string(),
            attempts: policy.max_attempts,
        })
    }

    pub async fn fetch_results(&self, job_id: &str) -> Result<Vec<ResultRecord>> {
        let url = self
            .client
            .endpoints()
            .scoped_url(self.workspace, &["search", "jobs", job_id, "results"])?;
        let builder = self.client.authorized(self.client.http().get(url), self.token);

        let body = self
            .client
            .send_text(builder, &format!("fetch results of search job {job_id}"))
            .await?;
        let records = parse_ndjson(&body)?;

        info!(job_id, records = records.len(), "search results fetched");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_map_to_terminal_states() {
        assert!(JobStatus::parse("done").is_success());
        assert!(JobStatus::parse("completed").is_success());
        assert!(JobStatus::parse("failed").is_terminal());
        assert!(!JobStatus::parse("failed").is_success());
        assert!(!JobStatus::parse("running").is_terminal());
        assert_eq!(JobStatus::parse("queued"), JobStatus::Other("queued".into()));
    }

    #[test]
    fn request_serializes_with_sample_rate() {
        let request = SearchRequest::for_dataset("cribl_logs", 10).with_range("-24h", "now");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "query": "cribl dataset=\"cribl_logs\" | limit 10",
                "earliest": "-24h",
                "latest": "now",
                "sampleRate": 1
            })
        );
    }

    #[test]
    fn default_policy_matches_two_second_sixty_attempts() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.max_attempts, 60);
    }
}
