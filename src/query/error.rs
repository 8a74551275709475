//! Query error types
//!
//! Errors raised while turning request parameters into Flux.

use thiserror::Error;

/// Errors that can occur while building a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// `at` parameter could not be parsed as a timestamp
    #[error("invalid 'at' timestamp: {0}")]
    InvalidInstant(String),

    /// Field filter token outside `[A-Za-z0-9_]`
    #[error("invalid field filter token: {0}")]
    InvalidFilterToken(String),

    /// Required parameter missing or empty
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
