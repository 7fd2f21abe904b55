use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter};
use polars::prelude::{CsvWriter, JsonFormat, JsonWriter, SerWriter};

use crate::errors::RecordError;
use crate::table::NamedTable;

/// On-disk formats a [`NamedTable`] can be published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Csv,
    Parquet,
    /// Newline-delimited JSON.
    Json,
}

impl TableFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
            TableFormat::Json => "ndjson",
        }
    }

    /// `<dir>/<table name>.<extension>`
    pub fn output_path(&self, dir: &Path, table: &NamedTable) -> PathBuf {
        dir.join(format!("{}.{}", table.name, self.extension()))
    }
}

impl FromStr for TableFormat {
    type Err = RecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "parquet" => Ok(TableFormat::Parquet),
            "json" | "ndjson" | "jsonl" => Ok(TableFormat::Json),
            other => Err(RecordError::UnknownFormat(other.to_string())),
        }
    }
}

pub fn write_table(table: &NamedTable, path: &Path, format: TableFormat) -> Result<(), RecordError> {
    let mut file = File::create(path)?;
    let mut frame = table.frame.clone();

    match format {
        TableFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut frame)?;
        }
        TableFormat::Parquet => {
            ParquetWriter::new(&mut file)
                .with_compression(ParquetCompression::Zstd(None))
                .finish(&mut frame)?;
        }
        TableFormat::Json => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::JsonLines)
                .finish(&mut frame)?;
        }
    }

    Ok(())
}
