pub mod auth;
pub mod config;
pub mod directory;
pub mod endpoints;
pub mod error;
pub mod export;
pub mod http;
pub mod lookups;
pub mod search;
pub mod sync;
pub mod version;

pub use criblsync_records as records;
