//! Device Lookup Route
//!
//! - GET /api/influx/device?id= - Latest readings of one device

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::{DeviceParams, DeviceResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::query::device_lookup;
use crate::response::DeviceSnapshot;

/// GET /api/influx/device
///
/// Returns the untouched database output together with the series name,
/// number, location, freshness and electrical readings found in it.
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DeviceParams>, QueryRejection>,
) -> ApiResult<Json<DeviceResponse>> {
    let Query(params) = query?;
    let id = params
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("missing id query param".to_string()))?;

    let flux = device_lookup(state.bucket(), &id, &state.config.query.device_tags);
    let raw = state.store.query_raw(&flux).await?;
    let parsed = DeviceSnapshot::extract(&raw, Utc::now());

    tracing::debug!(id = %id, fresh = ?parsed.ok, "device looked up");

    Ok(Json(DeviceResponse {
        ok: true,
        id,
        raw,
        parsed,
    }))
}
