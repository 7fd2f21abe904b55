// crates/criblsync-core/src/error.rs

use criblsync_records::RecordError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{context}: request failed: {source}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: server returned {status}: {body}")]
    Status {
        context: String,
        status: StatusCode,
        body: String,
    },

    #[error("{context}: malformed response: {message}")]
    MalformedResponse { context: String, message: String },

    #[error("search job {job_id} failed")]
    JobFailed { job_id: String },

    #[error("search job {job_id} did not reach a terminal state after {attempts} status checks")]
    PollTimeout { job_id: String, attempts: u32 },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record processing error: {0}")]
    Records(#[from] RecordError),
}

impl ClientError {
    pub(crate) fn http(context: impl Into<String>) -> impl FnOnce(reqwest::Error) -> Self {
        let context = context.into();
        move |source| ClientError::Http { context, source }
    }

    pub(crate) fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::MalformedResponse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// True for failures raised before any request was sent.
    pub fn is_config(&self) -> bool {
        matches!(self, ClientError::Config(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;
