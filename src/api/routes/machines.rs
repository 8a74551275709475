//! Machine Registration Route
//!
//! - POST /api/admin/machines - Register a machine

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;

use crate::api::dto::{Machine, MachineRequest, MachineResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::line_protocol::{EncodingOptions, Point, DEVICE_TAG};

/// Measurement registrations are written to
pub const MACHINES_MEASUREMENT: &str = "machines";

/// POST /api/admin/machines
///
/// Writes one `machines` point with the registration encoding. A body that is
/// not valid JSON is treated as empty.
pub async fn register_machine(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<MachineResponse>> {
    let req: MachineRequest = serde_json::from_slice(&body?).unwrap_or_default();

    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some(name), Some(ksave)) = (non_empty(req.name), non_empty(req.ksave)) else {
        return Err(ApiError::Validation("name and ksave are required".to_string()));
    };
    let location = non_empty(req.location);

    let now = Utc::now();
    let created_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    let line = registration_point(&name, &ksave, location.as_deref(), &created_at)
        .encode(&EncodingOptions::registration())?;
    state.store.write_lines(line.into_string()).await?;

    tracing::info!(name = %name, ksave = %ksave, "machine registered");

    Ok(Json(MachineResponse {
        ok: true,
        machine: Machine {
            id: format!("m-{}", now.timestamp_millis()),
            name,
            ksave,
            location,
            created_at,
        },
        written: 1,
    }))
}

/// The point recording a registration; no timestamp, the database stamps it
fn registration_point(name: &str, ksave: &str, location: Option<&str>, created_at: &str) -> Point {
    let mut point = Point::new(MACHINES_MEASUREMENT)
        .tag(DEVICE_TAG, ksave)
        .tag("name", name)
        .field("registered", true)
        .field("createdAt", created_at);

    if let Some(location) = location {
        point = point.tag("site", location);
    }

    point
}
