//! Upstream error types

use thiserror::Error;

/// Errors talking to the time-series database
#[derive(Error, Debug)]
pub enum InfluxError {
    /// Connection, DNS, timeout or body read failure
    #[error("failed to reach database: {0}")]
    Transport(#[from] reqwest::Error),

    /// Database answered with a non-success status
    #[error("database returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Client could not be built from configuration
    #[error("invalid database client configuration: {0}")]
    Config(String),
}

impl InfluxError {
    /// Upstream HTTP status, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            InfluxError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for upstream operations
pub type InfluxResult<T> = Result<T, InfluxError>;
