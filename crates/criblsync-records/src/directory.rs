use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;

use crate::errors::RecordError;

/// Attributes requested from the directory, in CSV column order.
pub const DIRECTORY_ATTRIBUTES: [&str; 5] = [
    "sAMAccountName",
    "DisplayName",
    "EmailAddress",
    "Department",
    "Title",
];

/// One user entry from the directory. Missing attributes are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub account_name: String,
    pub display_name: String,
    pub email_address: String,
    pub department: String,
    pub title: String,
}

impl DirectoryRecord {
    /// Builds a record from an LDAP attribute map.
    ///
    /// Directory servers do not agree on attribute name casing, so names are matched
    /// case-insensitively and the first value of a multi-valued attribute wins.
    pub fn from_attributes(attributes: &HashMap<String, Vec<String>>) -> Self {
        let lookup = |wanted: &str| -> String {
            attributes
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .and_then(|(_, values)| values.first())
                .cloned()
                .unwrap_or_default()
        };

        Self {
            account_name: lookup(DIRECTORY_ATTRIBUTES[0]),
            display_name: lookup(DIRECTORY_ATTRIBUTES[1]),
            email_address: lookup(DIRECTORY_ATTRIBUTES[2]),
            department: lookup(DIRECTORY_ATTRIBUTES[3]),
            title: lookup(DIRECTORY_ATTRIBUTES[4]),
        }
    }

    fn as_row(&self) -> [&str; 5] {
        [
            &self.account_name,
            &self.display_name,
            &self.email_address,
            &self.department,
            &self.title,
        ]
    }
}

/// Writes the fixed header followed by one row per record. The header is written even when
/// `records` is empty.
pub fn write_directory_csv<W: Write>(writer: W, records: &[DirectoryRecord]) -> Result<(), RecordError> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    csv_writer.write_record(DIRECTORY_ATTRIBUTES)?;
    for record in records {
        csv_writer.write_record(record.as_row())?;
    }
    csv_writer.flush()?;

    Ok(())
}

pub fn export_directory_csv(path: &Path, records: &[DirectoryRecord]) -> Result<(), RecordError> {
    let file = File::create(path)?;
    write_directory_csv(file, records)
}
