pub mod directory;
pub mod errors;
pub mod ndjson;
pub mod table;
pub mod writer;

pub use directory::{export_directory_csv, write_directory_csv, DirectoryRecord, DIRECTORY_ATTRIBUTES};
pub use errors::RecordError;
pub use ndjson::{parse_ndjson, ResultRecord};
pub use table::{NamedTable, TableBuilder, DEFAULT_DROPPED_COLUMNS};
pub use writer::{write_table, TableFormat};

#[cfg(test)]
mod tests;
