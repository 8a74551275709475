//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes. Every error renders the
//! same envelope:
//!
//! ```json
//! { "ok": false, "error": "...", "status": 400 }
//! ```
//!
//! `status` is present only for upstream rejections and carries the
//! database's own status code.

use axum::{
    extract::rejection::{BytesRejection, QueryRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::influx::InfluxError;
use crate::line_protocol::LineError;
use crate::query::QueryError;

/// Header carrying the id logged with an error
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("{0}")]
    Validation(String),

    /// Payload could not be encoded
    #[error(transparent)]
    Line(#[from] LineError),

    /// Query parameters rejected
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Request body over the configured limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Missing or wrong guard header
    #[error("{0}")]
    Unauthorized(String),

    /// Database call failed
    #[error(transparent)]
    Upstream(#[from] InfluxError),

    /// Internal server error
    #[error("{0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Line(_) | ApiError::Query(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(InfluxError::Transport(_) | InfluxError::Status { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Upstream(InfluxError::Config(_))
            | ApiError::Internal(_)
            | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            // The database's own message is more useful than our wrapper.
            ApiError::Upstream(InfluxError::Status { status, body }) => ErrorResponse {
                ok: false,
                error: body.clone(),
                status: Some(*status),
            },
            other => ErrorResponse {
                ok: false,
                error: other.to_string(),
                status: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                status = status.as_u16(),
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                status = status.as_u16(),
                error_message = %self,
                "Request rejected"
            );
        }

        let mut response = (status, Json(self.body())).into_response();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::Validation(rejection.body_text())
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Line(LineError::NoValidPoints).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Query(QueryError::InvalidInstant("x".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::PayloadTooLarge("x".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Upstream(InfluxError::Status {
                status: 422,
                body: "bad".into()
            })
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Upstream(InfluxError::Config("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_body_passes_through() {
        let body = ApiError::Upstream(InfluxError::Status {
            status: 401,
            body: "unauthorized access".into(),
        })
        .body();

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ok": false, "error": "unauthorized access", "status": 401})
        );
    }

    #[test]
    fn test_envelope_without_status() {
        let json = serde_json::to_value(ApiError::Line(LineError::NoValidPoints).body()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ok": false, "error": "no valid points to write"})
        );
    }

    #[test]
    fn test_response_has_request_id() {
        let response = ApiError::Validation("missing id query param".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }
}
