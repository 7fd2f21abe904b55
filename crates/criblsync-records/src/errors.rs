use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("NDJSON line {line} is not valid JSON: {source}")]
    Ndjson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown table format '{0}' (expected csv, parquet or json)")]
    UnknownFormat(String),
}
