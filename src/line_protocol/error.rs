//! Line protocol error types
//!
//! Errors raised while turning gateway payloads into wire lines.

use thiserror::Error;

/// Errors that can occur while building line protocol
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    /// Point has no non-null field left after filtering
    #[error("point has no fields to write")]
    EmptyFields,

    /// Measurement name is empty
    #[error("measurement name cannot be empty")]
    EmptyMeasurement,

    /// Payload entry is not a JSON object
    #[error("point must be a JSON object")]
    NotAnObject,

    /// Field value is an array or a nested object deeper than one level
    #[error("unsupported value for field '{0}'")]
    UnsupportedField(String),

    /// Tag value is not a scalar
    #[error("unsupported value for tag '{0}'")]
    UnsupportedTag(String),

    /// `tags` / `fields` present but not an object
    #[error("'{0}' must be a JSON object")]
    InvalidSection(&'static str),

    /// Every point of a batch was rejected
    #[error("no valid points to write")]
    NoValidPoints,

    /// A wire line could not be decoded
    #[error("malformed line: {0}")]
    Malformed(String),
}

/// Result type alias for line protocol operations
pub type LineResult<T> = Result<T, LineError>;
