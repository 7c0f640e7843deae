//! Error types for the chronoload pipeline
//!
//! The variants fall into four classes that callers branch on:
//!
//! - **network**: transport failures and non-2xx responses ([`PipelineError::is_network`])
//! - **protocol**: a response arrived but its envelope could not be parsed
//! - **ingestion**: one chunk could not be cast into the canonical table
//! - **abort**: cooperative cancellation, never reported as a failure ([`PipelineError::is_abort`])
//!
//! Everything else (configuration, IO, engine connection) is fatal to the call.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Transport-level failure (connect, reset, timeout, body read)
    #[error("Network request failed: {0}. Check your connection and the configured API URL.")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Request to '{url}' failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The response could not be parsed into the expected envelope
    #[error("Unexpected response from server: {0}")]
    Protocol(String),

    /// A chunk could not be staged or cast into the canonical table
    #[error("Failed to ingest chunk '{chunk}': {message}")]
    Ingestion { chunk: String, message: String },

    /// The analytical engine could not be opened or its schema prepared
    #[error("Failed to open analytical database '{path}': {message}")]
    Connection { path: String, message: String },

    /// The transfer was cancelled by the caller
    #[error("Transfer aborted")]
    Aborted,

    /// Every chunk of a query failed to download
    #[error("All {attempted} chunk(s) failed to download. Re-run the query or lower --concurrency.")]
    NoChunksSucceeded { attempted: usize },

    /// Chunks downloaded but every one was rejected by the sink
    #[error("None of the {downloaded} downloaded chunk(s) could be ingested; first rejection: {reason}")]
    NoChunksIngested { downloaded: usize, reason: String },

    /// Assembled archive does not match its published digest
    #[error("Checksum verification failed for '{name}': expected '{expected}', got '{actual}'")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check chronoload.toml or CHRONOLOAD_* environment variables.")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn ingestion(chunk: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Ingestion {
            chunk: chunk.into(),
            message: message.to_string(),
        }
    }

    pub fn connection(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Connection {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn http_status(url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status: status.as_u16(),
        }
    }

    /// Transport failure or non-2xx response
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::HttpStatus { .. })
    }

    /// Cooperative cancellation; callers must not report it as a failure
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<chronoload_common::CommonError> for PipelineError {
    fn from(err: chronoload_common::CommonError) -> Self {
        match err {
            chronoload_common::CommonError::Io(e) => Self::Io(e),
            chronoload_common::CommonError::InvalidContentRange(header) => {
                Self::Protocol(format!("invalid Content-Range header '{}'", header))
            },
            other => Self::Other(other.into()),
        }
    }
}
