//! Write Routes
//!
//! - POST /api/influx/write - Generic write (single point, array or `{points}`)

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::HeaderMap,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::WriteResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::guard::{require_token, WRITE_TOKEN_HEADER};
use crate::api::state::AppState;
use crate::line_protocol::{encode_batch, point_from_json, split_points};

/// POST /api/influx/write
///
/// Encode every point of the body and write the lines in one request.
/// Points that cannot be encoded are skipped and listed in `rejected`.
pub async fn write_points(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<WriteResponse>> {
    let body = body?;
    if !state.config.influx.is_writable() {
        return Err(ApiError::Validation(
            "INFLUX_HOST/ORG/BUCKET/TOKEN not configured".to_string(),
        ));
    }

    require_token(
        &headers,
        WRITE_TOKEN_HEADER,
        state.config.influx.write_token.as_deref(),
    )?;

    let body = parse_body(&body)?;
    let points = split_points(&body)
        .into_iter()
        .map(|payload| point_from_json(payload, &state.resolver));
    let batch = encode_batch(points, &state.config.encoding)?;

    for rejected in &batch.rejected {
        tracing::debug!(index = rejected.index, error = %rejected.error, "point rejected");
    }

    state.store.write_lines(batch.body()).await?;

    tracing::info!(
        written = batch.written(),
        rejected = batch.rejected.len(),
        bucket = %state.bucket(),
        "points written"
    );

    Ok(Json(WriteResponse {
        ok: true,
        written: batch.written(),
        bucket: state.bucket().to_string(),
        rejected: batch.rejected.into_iter().map(Into::into).collect(),
    }))
}

/// Parse a JSON request body so that malformed input maps to the error envelope
pub(crate) fn parse_body(body: &[u8]) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::Validation("missing request body".to_string()));
    }

    serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("invalid JSON body: {}", e)))
}
