use criblsync_records::{NamedTable, TableBuilder};
use tracing::info;

use crate::auth::Authenticator;
use crate::endpoints::ClientCredentials;
use crate::error::Result;
use crate::http::CloudClient;
use crate::search::{PollPolicy, SearchJobs, SearchRequest};

/// Search-to-table run: authenticate, submit, poll, fetch, build.
pub struct SearchExport<'a> {
    client: &'a CloudClient,
    credentials: ClientCredentials,
    workspace: String,
    request: SearchRequest,
    policy: PollPolicy,
    table: TableBuilder,
}

impl<'a> SearchExport<'a> {
    pub fn new(
        client: &'a CloudClient,
        credentials: ClientCredentials,
        workspace: impl Into<String>,
        request: SearchRequest,
        table: TableBuilder,
    ) -> Self {
        Self {
            client,
            credentials,
            workspace: workspace.into(),
            request,
            policy: PollPolicy::default(),
            table,
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn run(&self) -> Result<NamedTable> {
        let token = Authenticator::new(self.client)
            .exchange(&self.credentials)
            .await?;

        let jobs = SearchJobs::new(self.client, &token, &self.workspace);
        let job_id = jobs.submit(&self.request).await?;
        jobs.wait_for_completion(&job_id, &self.policy).await?;
        let records = jobs.fetch_results(&job_id).await?;

        let table = self.table.build(&records)?;
        info!(
            table = %table.name,
            rows = table.height(),
            columns = table.frame.width(),
            "search results tabulated"
        );
        Ok(table)
    }
}
