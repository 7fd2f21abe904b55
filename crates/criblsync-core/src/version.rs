use serde::{Deserialize, Serialize};
use tracing::info;

use crate::endpoints::BearerToken;
use crate::error::{ClientError, Result};
use crate::http::{CloudClient, Items};
use crate::lookups::LookupFile;

pub const COMMIT_MESSAGE: &str = "Automated lookup file update";

#[derive(Debug, Serialize)]
struct CommitBody<'a> {
    message: &'a str,
    group: &'a str,
    files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    commit: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeployBody<'a> {
    version: &'a str,
}

/// Repository paths a lookup change touches: the data file and its `.yml` sibling. Both are
/// always listed, whether or not the `.yml` exists yet.
pub fn lookup_commit_paths(group: &str, lookup: &LookupFile) -> Vec<String> {
    vec![
        format!("groups/{group}/data/lookups/{}", lookup.id),
        format!("groups/{group}/data/lookups/{}", lookup.metadata_id()),
    ]
}

pub struct VersionControl<'a> {
    client: &'a CloudClient,
    token: &'a BearerToken,
    group: &'a str,
}

impl<'a> VersionControl<'a> {
    pub fn new(client: &'a CloudClient, token: &'a BearerToken, group: &'a str) -> Self {
        Self {
            client,
            token,
            group,
        }
    }

    /// Commits the lookup's files and returns the commit id.
    pub async fn commit(&self, lookup: &LookupFile) -> Result<String> {
        let url = self
            .client
            .endpoints()
            .scoped_url(self.group, &["version", "commit"])?;
        let body = CommitBody {
            message: COMMIT_MESSAGE,
            group: self.group,
            files: lookup_commit_paths(self.group, lookup),
        };
        let request = self
            .client
            .authorized(self.client.http().post(url), self.token)
            .json(&body);

        let context = format!("commit changes for '{}' in {}", lookup.id, self.group);
        let items: Items<CommitItem> = self.client.send_json(request, &context).await?;
        let commit_id = items
            .into_first(&context)?
            .commit
            .filter(|commit| !commit.is_empty())
            .ok_or_else(|| ClientError::malformed(&context, "missing 'commit' id"))?;

        info!(group = self.group, commit = %commit_id, "changes committed");
        Ok(commit_id)
    }

    pub async fn deploy(&self, commit_id: &str) -> Result<()> {
        let url = self
            .client
            .endpoints()
            .master_url(&["groups", self.group, "deploy"])?;
        let request = self
            .client
            .authorized(self.client.http().patch(url), self.token)
            .json(&DeployBody { version: commit_id });

        self.client
            .send_unit(request, &format!("deploy changes to {}", self.group))
            .await?;
        info!(group = self.group, commit = commit_id, "changes deployed");
        Ok(())
    }
}
