use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use criblsync_core::config::{ConfigResolver, SearchOptions, DEFAULT_CONFIG_PATH};
use criblsync_core::endpoints::CloudEndpoints;
use criblsync_core::export::SearchExport;
use criblsync_core::http::{CloudClient, DEFAULT_REQUEST_TIMEOUT};
use criblsync_core::records::{write_table, NamedTable, TableBuilder, TableFormat};
use criblsync_core::search::PollPolicy;
use polars::prelude::AnyValue;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Run a search job and publish its results as a table
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML config file; the `[search]` table is read
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long, env = "CRIBL_CLIENT_ID")]
    client_id: Option<String>,
    #[arg(long, env = "CRIBL_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,
    #[arg(long, env = "CRIBL_ORG_ID")]
    org_id: Option<String>,
    /// Search workspace the job runs in
    #[arg(long)]
    workspace: Option<String>,
    /// Dataset sampled when no --query is given
    #[arg(long)]
    dataset: Option<String>,
    #[arg(long)]
    query: Option<String>,
    /// Earliest time of the search range (default -1h)
    #[arg(long)]
    earliest: Option<String>,
    /// Latest time of the search range (default now)
    #[arg(long)]
    latest: Option<String>,
    /// Name of the produced table and its output file
    #[arg(long)]
    output_name: Option<String>,
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// csv, parquet or json (newline-delimited)
    #[arg(long, default_value = "csv")]
    format: TableFormat,
    /// Column to remove from the table; repeatable. Replaces the default administrative columns.
    #[arg(long = "drop-column")]
    drop_columns: Vec<String>,
    #[arg(long, default_value_t = 2)]
    poll_interval_secs: u64,
    #[arg(long, default_value_t = 60)]
    max_attempts: u32,
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout_secs: u64,
    /// Rows printed to stdout after the export; 0 disables the preview
    #[arg(long, default_value_t = 10)]
    preview_rows: usize,
}

impl Cli {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            organization_id: self.org_id.clone(),
            workspace: self.workspace.clone(),
            dataset: self.dataset.clone(),
            query: self.query.clone(),
            earliest: self.earliest.clone(),
            latest: self.latest.clone(),
            output_name: self.output_name.clone(),
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
    let settings = resolver.search(&cli.options());
    settings.validate().context("invalid search configuration")?;
    debug!(?settings, "search settings resolved");

    let endpoints = CloudEndpoints::search(&settings.organization_id)?;
    let client = CloudClient::new(endpoints, Duration::from_secs(cli.timeout_secs))?;

    let mut builder = TableBuilder::new(&settings.output_name);
    if !cli.drop_columns.is_empty() {
        builder = builder.drop_columns(cli.drop_columns.iter());
    }
    debug!(dropped = ?builder.dropped_columns(), "columns excluded from the table");
    let policy = PollPolicy {
        interval: Duration::from_secs(cli.poll_interval_secs),
        max_attempts: cli.max_attempts,
    };

    let table = SearchExport::new(
        &client,
        settings.credentials(),
        &settings.workspace,
        settings.request(),
        builder,
    )
    .with_poll_policy(policy)
    .run()
    .await
    .context("search export failed")?;

    let path = cli.format.output_path(&cli.output_dir, &table);
    write_table(&table, &path, cli.format)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(table = %table.name, path = %path.display(), rows = table.height(), "table written");

    println!("\n--- Search Export Summary ---");
    println!("  Table:   {}", table.name);
    println!("  Rows:    {}", table.height());
    println!("  Columns: {}", table.column_names().join(", "));
    println!("  Output:  {}", path.display());
    if cli.preview_rows > 0 && table.height() > 0 {
        println!("\n{}", preview(&table, cli.preview_rows)?);
    }
    Ok(())
}

fn preview(table: &NamedTable, rows: usize) -> Result<Table> {
    let head = table.frame.head(Some(rows));
    let mut rendered = Table::new();
    rendered.set_header(table.column_names());

    for row in 0..head.height() {
        let cells = head
            .get_columns()
            .iter()
            .map(|column| column.get(row).map(cell_text))
            .collect::<Result<Vec<_>, _>>()?;
        rendered.add_row(cells);
    }
    Ok(rendered)
}

fn cell_text(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(text) => text.to_string(),
        other => other.to_string(),
    }
}
