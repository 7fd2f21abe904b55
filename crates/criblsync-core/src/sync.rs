//! Lookup publication as an explicit state machine:
//! `Authenticated -> Uploaded -> Resolved(Create | Update) -> Committed -> Deployed`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::endpoints::{BearerToken, ClientCredentials};
use crate::error::ClientError;
use crate::http::CloudClient;
use crate::lookups::{LookupCatalog, LookupFile};
use crate::version::VersionControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupAction {
    Create,
    Update,
}

impl LookupAction {
    /// Maps the catalog check onto an action. A failed check counts as "not found", so the
    /// run falls through to create.
    pub fn from_existence(check: &Result<bool, ClientError>) -> Self {
        match check {
            Ok(true) => LookupAction::Update,
            Ok(false) | Err(_) => LookupAction::Create,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Authenticate,
    Upload,
    Resolve,
    Commit,
    Deploy,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Authenticate => "authenticate",
            SyncStage::Upload => "upload",
            SyncStage::Resolve => "create/update",
            SyncStage::Commit => "commit",
            SyncStage::Deploy => "deploy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("lookup sync failed during {stage}: {source}")]
pub struct SyncError {
    pub stage: SyncStage,
    #[source]
    pub source: ClientError,
}

impl SyncError {
    fn at(stage: SyncStage) -> impl FnOnce(ClientError) -> Self {
        move |source| SyncError { stage, source }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub lookup_id: String,
    pub group: String,
    pub temp_filename: String,
    pub action: LookupAction,
    pub commit_id: String,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SyncState {
    Authenticated {
        token: BearerToken,
    },
    Uploaded {
        token: BearerToken,
        temp_filename: String,
    },
    Resolved {
        token: BearerToken,
        temp_filename: String,
        action: LookupAction,
    },
    Committed {
        token: BearerToken,
        temp_filename: String,
        action: LookupAction,
        commit_id: String,
    },
    Deployed(SyncReport),
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Authenticated { .. } => "authenticated",
            SyncState::Uploaded { .. } => "uploaded",
            SyncState::Resolved { .. } => "resolved",
            SyncState::Committed { .. } => "committed",
            SyncState::Deployed(_) => "deployed",
        }
    }
}

/// Publishes one lookup file to one worker group.
pub struct LookupSync<'a> {
    client: &'a CloudClient,
    credentials: ClientCredentials,
    group: String,
    lookup: LookupFile,
}

impl<'a> LookupSync<'a> {
    pub fn new(
        client: &'a CloudClient,
        credentials: ClientCredentials,
        group: impl Into<String>,
        lookup: LookupFile,
    ) -> Self {
        Self {
            client,
            credentials,
            group: group.into(),
            lookup,
        }
    }

    /// Runs every transition until the change is deployed.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let mut state = self.authenticate().await?;
        loop {
            state = match state {
                SyncState::Deployed(report) => return Ok(report),
                other => self.advance(other).await?,
            };
            info!(state = state.name(), lookup = %self.lookup.id, group = %self.group, "lookup sync advanced");
        }
    }

    pub async fn authenticate(&self) -> Result<SyncState, SyncError> {
        let token = Authenticator::new(self.client)
            .exchange(&self.credentials)
            .await
            .map_err(SyncError::at(SyncStage::Authenticate))?;
        Ok(SyncState::Authenticated { token })
    }

    /// Performs the single transition out of `state`. `Deployed` is returned unchanged.
    pub async fn advance(&self, state: SyncState) -> Result<SyncState, SyncError> {
        match state {
            SyncState::Authenticated { token } => {
                let temp_filename = self
                    .catalog(&token)
                    .upload(&self.lookup)
                    .await
                    .map_err(SyncError::at(SyncStage::Upload))?;
                Ok(SyncState::Uploaded {
                    token,
                    temp_filename,
                })
            }
            SyncState::Uploaded {
                token,
                temp_filename,
            } => {
                let catalog = self.catalog(&token);
                let check = catalog.exists(&self.lookup.id).await;
                if let Err(err) = &check {
                    warn!(error = %err, lookup = %self.lookup.id, "lookup existence check failed, treating as absent");
                }

                let action = LookupAction::from_existence(&check);
                let written = match action {
                    LookupAction::Update => catalog.update(&self.lookup.id, &temp_filename).await,
                    LookupAction::Create => catalog.create(&self.lookup.id, &temp_filename).await,
                };
                written.map_err(SyncError::at(SyncStage::Resolve))?;

                Ok(SyncState::Resolved {
                    token,
                    temp_filename,
                    action,
                })
            }
            SyncState::Resolved {
                token,
                temp_filename,
                action,
            } => {
                let commit_id = self
                    .version(&token)
                    .commit(&self.lookup)
                    .await
                    .map_err(SyncError::at(SyncStage::Commit))?;
                Ok(SyncState::Committed {
                    token,
                    temp_filename,
                    action,
                    commit_id,
                })
            }
            SyncState::Committed {
                token,
                temp_filename,
                action,
                commit_id,
            } => {
                self.version(&token)
                    .deploy(&commit_id)
                    .await
                    .map_err(SyncError::at(SyncStage::Deploy))?;
                Ok(SyncState::Deployed(SyncReport {
                    lookup_id: self.lookup.id.clone(),
                    group: self.group.clone(),
                    temp_filename,
                    action,
                    commit_id,
                    finished_at: Utc::now(),
                }))
            }
            deployed @ SyncState::Deployed(_) => Ok(deployed),
        }
    }

    fn catalog<'t>(&'t self, token: &'t BearerToken) -> LookupCatalog<'t> {
        LookupCatalog::new(self.client, token, &self.group)
    }

    fn version<'t>(&'t self, token: &'t BearerToken) -> VersionControl<'t> {
        VersionControl::new(self.client, token, &self.group)
    }
}
