//! Current Values Route
//!
//! - GET /api/influx/currents?range=&at= - Latest current-like readings

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CurrentRow, CurrentsParams, CurrentsResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::query::{current_values, QueryWindow};
use crate::response::parse_table;

/// GET /api/influx/currents
///
/// `at` selects a one-minute window on each side of an instant and wins
/// over `range`. An invalid `range` falls back to the configured default.
pub async fn get_currents(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CurrentsParams>, QueryRejection>,
) -> ApiResult<Json<CurrentsResponse>> {
    let Query(params) = query?;
    let window = QueryWindow::from_params(
        params.range.as_deref(),
        params.at.as_deref(),
        &state.default_range,
    )?;

    let flux = current_values(
        state.bucket(),
        &window,
        &state.config.query.field_filter,
    );
    let csv = state.store.query_csv(&flux).await?;

    let rows: Vec<CurrentRow> = parse_table(&csv).iter().map(CurrentRow::from).collect();
    tracing::debug!(rows = rows.len(), range = %window.flux_range(), "currents queried");

    Ok(Json(CurrentsResponse { ok: true, rows }))
}
