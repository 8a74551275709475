//! Optional shared-secret header guards

use axum::http::HeaderMap;

use crate::api::error::{ApiError, ApiResult};

pub const WRITE_TOKEN_HEADER: &str = "x-write-token";
pub const SEED_TOKEN_HEADER: &str = "x-seed-token";

/// Require `header` to equal `expected` when a token is configured.
///
/// An unset or empty expected token disables the guard.
pub fn require_token(headers: &HeaderMap, header: &str, expected: Option<&str>) -> ApiResult<()> {
    let Some(expected) = expected.filter(|t| !t.is_empty()) else {
        return Ok(());
    };

    let presented = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if presented == expected {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(format!(
            "unauthorized (missing or bad {})",
            header
        )))
    }
}
