//! Configuration resolution: command line over config file over defaults.
//!
//! The config file is TOML with one table per tool, `[cribl]` for the lookup sync and
//! `[search]` for the search export. A missing file is not an error.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::endpoints::{require, ClientCredentials};
use crate::error::{ConfigError, Result};
use crate::search::{SearchRequest, DEFAULT_EARLIEST, DEFAULT_LATEST};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_TARGET_GROUP: &str = "default";
pub const DEFAULT_OUTPUT_NAME: &str = "search_results";
pub const DEFAULT_DATASET_LIMIT: usize = 10;

/// A non-empty command-line value wins, then the file value, then `default`.
pub fn resolve_field(cli: Option<&str>, file: Option<&str>, default: &str) -> String {
    cli.filter(|value| !value.is_empty())
        .or_else(|| file.filter(|value| !value.is_empty()))
        .unwrap_or(default)
        .to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LookupSyncOptions {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub organization_id: Option<String>,
    pub lookup_filename: Option<String>,
    pub target_worker_group: Option<String>,
    pub ad_server: Option<String>,
    pub ad_user: Option<String>,
    pub ad_password: Option<String>,
    pub ad_domain: Option<String>,
    pub ad_search_domain: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub organization_id: Option<String>,
    pub workspace: Option<String>,
    pub dataset: Option<String>,
    pub query: Option<String>,
    pub earliest: Option<String>,
    pub latest: Option<String>,
    pub output_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub cribl: LookupSyncOptions,
    #[serde(default)]
    pub search: SearchOptions,
}

#[derive(Debug, Default)]
pub struct ConfigResolver {
    file: ConfigFile,
}

impl ConfigResolver {
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    pub fn parse(raw: &str, origin: &str) -> std::result::Result<Self, ConfigError> {
        let file = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        Ok(Self { file })
    }

    pub fn lookup_sync(&self, cli: &LookupSyncOptions) -> LookupSyncSettings {
        let file = &self.file.cribl;
        let pick = |cli: &Option<String>, file: &Option<String>, default: &str| {
            resolve_field(cli.as_deref(), file.as_deref(), default)
        };

        LookupSyncSettings {
            client_id: pick(&cli.client_id, &file.client_id, ""),
            client_secret: pick(&cli.client_secret, &file.client_secret, ""),
            organization_id: pick(&cli.organization_id, &file.organization_id, ""),
            lookup_filename: pick(&cli.lookup_filename, &file.lookup_filename, ""),
            target_group: pick(
                &cli.target_worker_group,
                &file.target_worker_group,
                DEFAULT_TARGET_GROUP,
            ),
            ad_server: pick(&cli.ad_server, &file.ad_server, ""),
            ad_user: pick(&cli.ad_user, &file.ad_user, ""),
            ad_password: pick(&cli.ad_password, &file.ad_password, ""),
            ad_domain: pick(&cli.ad_domain, &file.ad_domain, ""),
            ad_search_domain: pick(&cli.ad_search_domain, &file.ad_search_domain, ""),
        }
    }

    pub fn search(&self, cli: &SearchOptions) -> SearchSettings {
        let file = &self.file.search;
        let pick = |cli: &Option<String>, file: &Option<String>, default: &str| {
            resolve_field(cli.as_deref(), file.as_deref(), default)
        };

        SearchSettings {
            client_id: pick(&cli.client_id, &file.client_id, ""),
            client_secret: pick(&cli.client_secret, &file.client_secret, ""),
            organization_id: pick(&cli.organization_id, &file.organization_id, ""),
            workspace: pick(&cli.workspace, &file.workspace, ""),
            dataset: pick(&cli.dataset, &file.dataset, ""),
            query: pick(&cli.query, &file.query, ""),
            earliest: pick(&cli.earliest, &file.earliest, DEFAULT_EARLIEST),
            latest: pick(&cli.latest, &file.latest, DEFAULT_LATEST),
            output_name: pick(&cli.output_name, &file.output_name, DEFAULT_OUTPUT_NAME),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct LookupSyncSettings {
    pub client_id: String,
    pub client_secret: String,
    pub organization_id: String,
    pub lookup_filename: String,
    pub target_group: String,
    pub ad_server: String,
    pub ad_user: String,
    pub ad_password: String,
    pub ad_domain: String,
    pub ad_search_domain: String,
}

impl LookupSyncSettings {
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials::new(&self.client_id, &self.client_secret)
    }

    /// Checks the cloud-side settings. Directory settings are checked by
    /// [`crate::directory::DirectoryQuery::from_settings`].
    pub fn validate(&self) -> Result<()> {
        self.credentials().validate()?;
        require("organization id", &self.organization_id)?;
        require("lookup filename", &self.lookup_filename)?;
        require("target worker group", &self.target_group)?;
        Ok(())
    }
}

impl fmt::Debug for LookupSyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupSyncSettings")
            .field("client_id", &self.client_id)
            .field("organization_id", &self.organization_id)
            .field("lookup_filename", &self.lookup_filename)
            .field("target_group", &self.target_group)
            .field("ad_server", &self.ad_server)
            .field("ad_user", &self.ad_user)
            .field("ad_domain", &self.ad_domain)
            .field("ad_search_domain", &self.ad_search_domain)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub client_id: String,
    pub client_secret: String,
    pub organization_id: String,
    pub workspace: String,
    pub dataset: String,
    pub query: String,
    pub earliest: String,
    pub latest: String,
    pub output_name: String,
}

impl SearchSettings {
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials::new(&self.client_id, &self.client_secret)
    }

    pub fn validate(&self) -> Result<()> {
        self.credentials().validate()?;
        require("organization id", &self.organization_id)?;
        require("workspace", &self.workspace)?;
        require("output name", &self.output_name)?;
        if self.query.trim().is_empty() {
            require("query or dataset", &self.dataset)?;
        }
        Ok(())
    }

    /// An explicit query wins; otherwise the dataset is sampled.
    pub fn request(&self) -> SearchRequest {
        let request = if self.query.trim().is_empty() {
            SearchRequest::for_dataset(&self.dataset, DEFAULT_DATASET_LIMIT)
        } else {
            SearchRequest::new(&self.query)
        };
        request.with_range(&self.earliest, &self.latest)
    }
}

impl fmt::Debug for SearchSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSettings")
            .field("client_id", &self.client_id)
            .field("organization_id", &self.organization_id)
            .field("workspace", &self.workspace)
            .field("dataset", &self.dataset)
            .field("query", &self.query)
            .field("earliest", &self.earliest)
            .field("latest", &self.latest)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}
