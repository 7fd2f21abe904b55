use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use criblsync_core::config::{ConfigResolver, LookupSyncOptions, DEFAULT_CONFIG_PATH};
use criblsync_core::directory::{export_users, DirectoryQuery, LdapDirectory};
use criblsync_core::endpoints::CloudEndpoints;
use criblsync_core::http::{CloudClient, DEFAULT_REQUEST_TIMEOUT};
use criblsync_core::lookups::LookupFile;
use criblsync_core::sync::LookupSync;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Export directory users to CSV and publish the file as a lookup to a worker group
#[derive(Parser, Debug)]
#[command(name = "ad-lookup-sync", version, about, long_about = None)]
struct Cli {
    /// TOML config file; the `[cribl]` table is read
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long, env = "CRIBL_CLIENT_ID")]
    client_id: Option<String>,
    #[arg(long, env = "CRIBL_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,
    #[arg(long, env = "CRIBL_ORG_ID")]
    organization_id: Option<String>,
    /// Local CSV path; its file name is the lookup id
    #[arg(long)]
    lookup_filename: Option<String>,
    /// LDAP URL of the directory server, e.g. ldap://dc.example.com
    #[arg(long)]
    ad_server: Option<String>,
    /// Bind user as user@domain, DOMAIN\user or a bare name
    #[arg(long)]
    ad_user: Option<String>,
    #[arg(long, env = "AD_PASSWORD", hide_env_values = true)]
    ad_password: Option<String>,
    #[arg(long)]
    ad_domain: Option<String>,
    /// Domain searched for users; defaults to --ad-domain
    #[arg(long)]
    ad_search_domain: Option<String>,
    /// Worker group the lookup is published to (default "default")
    #[arg(long)]
    target_group: Option<String>,
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

impl Cli {
    fn options(&self) -> LookupSyncOptions {
        LookupSyncOptions {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            organization_id: self.organization_id.clone(),
            lookup_filename: self.lookup_filename.clone(),
            target_worker_group: self.target_group.clone(),
            ad_server: self.ad_server.clone(),
            ad_user: self.ad_user.clone(),
            ad_password: self.ad_password.clone(),
            ad_domain: self.ad_domain.clone(),
            ad_search_domain: self.ad_search_domain.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    if let Err(err) = dotenvy::dotenv() {
        debug!(error = %err, "no .env file loaded");
    }
    let cli = Cli::parse();

    let resolver = ConfigResolver::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    let settings = resolver.lookup_sync(&cli.options());
    settings.validate().context("invalid lookup sync configuration")?;
    let query = DirectoryQuery::from_settings(&settings).context("invalid directory configuration")?;
    debug!(?settings, "lookup sync settings resolved");

    let output = PathBuf::from(&settings.lookup_filename);
    let lookup = LookupFile::from_path(&output)?;
    if lookup.is_gzip() {
        bail!(
            "lookup filename {} ends in .gz but directory exports are written as plain CSV",
            lookup.id
        );
    }
    let endpoints = CloudEndpoints::management(&settings.organization_id)?;

    let rows = export_users(&mut LdapDirectory, &query, &output)
        .await
        .context("directory export failed")?;

    let client = CloudClient::new(endpoints, Duration::from_secs(cli.timeout_secs))?;
    let report = LookupSync::new(&client, settings.credentials(), &settings.target_group, lookup)
        .run()
        .await?;
    info!(
        lookup = %report.lookup_id,
        group = %report.group,
        commit = %report.commit_id,
        rows,
        "lookup sync finished"
    );

    println!("\n--- Lookup Sync Summary ---");
    println!("  Directory rows: {rows}");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
