use std::collections::HashSet;

use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use serde_json::Value;

use crate::errors::RecordError;
use crate::ndjson::ResultRecord;

/// Administrative keys the search API mixes into result rows.
pub const DEFAULT_DROPPED_COLUMNS: [&str; 5] = [
    "isFinished",
    "offset",
    "persistedEventCount",
    "totalEventCount",
    "job",
];

/// A result table paired with the name it is published under.
#[derive(Debug, Clone)]
pub struct NamedTable {
    pub name: String,
    pub frame: DataFrame,
}

impl NamedTable {
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Number(number) if number.is_i64() => ColumnKind::Int,
            Value::Number(_) => ColumnKind::Float,
            Value::Bool(_) => ColumnKind::Bool,
            _ => ColumnKind::Text,
        }
    }

    fn merge(self, other: ColumnKind) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }
}

/// Turns parsed search results into a [`NamedTable`].
///
/// Columns are the union of record keys in first-seen order, minus the dropped set.
/// Rows whose remaining fields are all missing, `null` or empty strings are discarded.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    dropped_columns: Vec<String>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dropped_columns: DEFAULT_DROPPED_COLUMNS
                .iter()
                .map(|column| column.to_string())
                .collect(),
        }
    }

    /// Replaces the dropped column set. Names that never appear in the data are ignored.
    pub fn drop_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dropped_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }

    pub fn build(&self, records: &[ResultRecord]) -> Result<NamedTable, RecordError> {
        let dropped: HashSet<&str> = self.dropped_columns.iter().map(String::as_str).collect();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut names: Vec<&str> = Vec::new();
        for record in records {
            for key in record.keys() {
                let key = key.as_str();
                if !dropped.contains(key) && seen.insert(key) {
                    names.push(key);
                }
            }
        }

        let rows: Vec<&ResultRecord> = records
            .iter()
            .filter(|record| {
                names
                    .iter()
                    .any(|name| record.get(*name).is_some_and(|value| !is_empty_value(value)))
            })
            .collect();

        let columns: Vec<Column> = names.iter().map(|name| build_column(name, &rows)).collect();
        let frame = DataFrame::new(columns)?;

        Ok(NamedTable {
            name: self.name.clone(),
            frame,
        })
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn build_column(name: &str, rows: &[&ResultRecord]) -> Column {
    let values: Vec<Option<&Value>> = rows
        .iter()
        .map(|row| row.get(name).filter(|value| !value.is_null()))
        .collect();

    let kind = values
        .iter()
        .flatten()
        .map(|value| ColumnKind::of(value))
        .reduce(ColumnKind::merge)
        .unwrap_or(ColumnKind::Text);

    let series = match kind {
        ColumnKind::Int => Series::new(
            name.into(),
            values
                .iter()
                .map(|value| value.and_then(Value::as_i64))
                .collect::<Vec<_>>(),
        ),
        ColumnKind::Float => Series::new(
            name.into(),
            values
                .iter()
                .map(|value| value.and_then(Value::as_f64))
                .collect::<Vec<_>>(),
        ),
        ColumnKind::Bool => Series::new(
            name.into(),
            values
                .iter()
                .map(|value| value.and_then(Value::as_bool))
                .collect::<Vec<_>>(),
        ),
        ColumnKind::Text => Series::new(
            name.into(),
            values
                .iter()
                .map(|value| value.map(render_text))
                .collect::<Vec<Option<String>>>(),
        ),
    };

    series.into()
}

fn render_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
