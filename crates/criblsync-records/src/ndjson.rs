use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::RecordError;

/// One object from a search result body. Keys keep their source order.
pub type ResultRecord = Map<String, Value>;

/// Parses a newline-delimited JSON body.
///
/// Blank lines, empty objects and lines holding anything other than a JSON object are
/// skipped. Only invalid JSON is an error; its line number is 1-based and counts blank lines.
pub fn parse_ndjson(body: &str) -> Result<Vec<ResultRecord>, RecordError> {
    let mut records = Vec::new();

    for (index, line) in body.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(trimmed).map_err(|source| RecordError::Ndjson {
            line: index + 1,
            source,
        })?;

        match value {
            Value::Object(map) if map.is_empty() => continue,
            Value::Object(map) => records.push(map),
            other => debug!(line = index + 1, value = %other, "skipping non-object NDJSON line"),
        }
    }

    Ok(records)
}
