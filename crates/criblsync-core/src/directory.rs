//! Directory (LDAP) user export.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use criblsync_records::{export_directory_csv, DirectoryRecord, RecordError, DIRECTORY_ATTRIBUTES};
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{LdapConnAsync, LdapError, LdapResult, Scope, SearchEntry};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LookupSyncSettings;

pub const USER_FILTER: &str = "(objectClass=user)";

/// Entries requested per page of the user search.
pub const PAGE_SIZE: i32 = 500;

const SIZE_LIMIT_EXCEEDED: u32 = 4;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("directory {stage} failed: {source}")]
    Ldap {
        stage: &'static str,
        #[source]
        source: LdapError,
    },

    #[error("failed to write directory export: {0}")]
    Records(#[from] RecordError),
}

impl DirectoryError {
    fn ldap(stage: &'static str) -> impl FnOnce(LdapError) -> Self {
        move |source| DirectoryError::Ldap { stage, source }
    }
}

/// Splits a directory user into `(username, domain)`.
///
/// Accepts UPN (`joe@example.com`), NetBIOS (`EXAMPLE\joe` or `EXAMPLE/joe`) and bare
/// (`joe`) forms. An empty domain part falls back to `domain`; a bare user requires it.
pub fn parse_ad_user(user: &str, domain: &str) -> Result<(String, String), DirectoryError> {
    let user = user.trim();
    if user.is_empty() {
        return Err(DirectoryError::Config(
            "AD user must be specified in config or arguments".into(),
        ));
    }

    let split = if let Some((name, user_domain)) = user.split_once('@') {
        Some((name, user_domain))
    } else {
        let separator = if user.contains('\\') { '\\' } else { '/' };
        user.split_once(separator)
            .map(|(user_domain, name)| (name, user_domain))
    };

    match split {
        Some(("", _)) => Err(DirectoryError::Config(format!(
            "invalid AD user format: {user}. Username cannot be empty."
        ))),
        Some((name, "")) => Ok((name.to_string(), domain.to_string())),
        Some((name, user_domain)) => Ok((name.to_string(), user_domain.to_string())),
        None if domain.is_empty() => Err(DirectoryError::Config(format!(
            "AD domain must be specified when using plain username: {user}"
        ))),
        None => Ok((user.to_string(), domain.to_string())),
    }
}

/// `example.com` becomes `dc=example,dc=com`.
pub fn search_base(domain: &str) -> String {
    domain
        .split('.')
        .map(|component| format!("dc={component}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Bind principal in UPN form when a domain is known.
pub fn bind_principal(user: &str, domain: &str) -> Result<String, DirectoryError> {
    let (name, user_domain) = parse_ad_user(user, domain)?;
    if user_domain.is_empty() {
        Ok(name)
    } else {
        Ok(format!("{name}@{user_domain}"))
    }
}

/// A validated directory search. `Debug` never prints the password.
#[derive(Clone)]
pub struct DirectoryQuery {
    pub server: String,
    pub principal: String,
    password: String,
    pub search_base: String,
}

impl DirectoryQuery {
    pub fn new(
        server: &str,
        user: &str,
        password: &str,
        domain: &str,
        search_domain: &str,
    ) -> Result<Self, DirectoryError> {
        let principal = bind_principal(user, domain)?;

        let search_domain = if search_domain.is_empty() { domain } else { search_domain };
        if search_domain.is_empty() {
            return Err(DirectoryError::Config(
                "AD domain or search domain must be specified in config or arguments".into(),
            ));
        }
        if server.is_empty() {
            return Err(DirectoryError::Config(
                "AD server must be specified in config or arguments".into(),
            ));
        }
        if password.is_empty() {
            return Err(DirectoryError::Config(
                "AD password must be specified in config or arguments".into(),
            ));
        }

        Ok(Self {
            server: server.to_string(),
            principal,
            password: password.to_string(),
            search_base: search_base(search_domain),
        })
    }

    pub fn from_settings(settings: &LookupSyncSettings) -> Result<Self, DirectoryError> {
        Self::new(
            &settings.ad_server,
            &settings.ad_user,
            &settings.ad_password,
            &settings.ad_domain,
            &settings.ad_search_domain,
        )
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for DirectoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryQuery")
            .field("server", &self.server)
            .field("principal", &self.principal)
            .field("search_base", &self.search_base)
            .finish_non_exhaustive()
    }
}

/// Source of user entries for a [`DirectoryQuery`].
#[async_trait]
pub trait DirectorySource: Send {
    async fn fetch_users(&mut self, query: &DirectoryQuery) -> Result<Vec<DirectoryRecord>, DirectoryError>;
}

/// A finished search is accepted on success, or on a size-limit stop, which keeps the
/// entries already received.
fn check_search_result(result: LdapResult, received: usize) -> Result<(), LdapError> {
    if result.rc == SIZE_LIMIT_EXCEEDED {
        warn!(received, text = %result.text, "directory search stopped at the server size limit");
        return Ok(());
    }
    result.success().map(|_| ())
}

/// LDAP-backed source: simple bind, paged subtree search for user objects, unbind.
#[derive(Debug, Default, Clone, Copy)]
pub struct LdapDirectory;

#[async_trait]
impl DirectorySource for LdapDirectory {
    async fn fetch_users(&mut self, query: &DirectoryQuery) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        let (conn, mut ldap) = LdapConnAsync::new(&query.server)
            .await
            .map_err(DirectoryError::ldap("connect"))?;
        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!(error = %err, "LDAP connection closed with error");
            }
        });

        ldap.simple_bind(&query.principal, query.password())
            .await
            .and_then(|result| result.success())
            .map_err(DirectoryError::ldap("bind"))?;

        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(PAGE_SIZE)),
        ];
        let mut search = ldap
            .streaming_search_with(
                adapters,
                &query.search_base,
                Scope::Subtree,
                USER_FILTER,
                DIRECTORY_ATTRIBUTES.to_vec(),
            )
            .await
            .map_err(DirectoryError::ldap("search"))?;

        let mut records = Vec::new();
        while let Some(entry) = search.next().await.map_err(DirectoryError::ldap("search"))? {
            records.push(DirectoryRecord::from_attributes(&SearchEntry::construct(entry).attrs));
        }
        let outcome = search.finish().await;
        check_search_result(outcome, records.len()).map_err(DirectoryError::ldap("search"))?;

        if let Err(err) = ldap.unbind().await {
            warn!(error = %err, "LDAP unbind failed");
        }

        Ok(records)
    }
}

/// Queries `source` and writes the CSV export to `output`. Returns the number of rows.
pub async fn export_users<S>(
    source: &mut S,
    query: &DirectoryQuery,
    output: &Path,
) -> Result<usize, DirectoryError>
where
    S: DirectorySource + ?Sized,
{
    info!(
        server = %query.server,
        principal = %query.principal,
        search_base = %query.search_base,
        "querying directory"
    );
    let records = source.fetch_users(query).await?;
    export_directory_csv(output, &records)?;

    info!(rows = records.len(), output = %output.display(), "directory users exported");
    Ok(records.len())
}
