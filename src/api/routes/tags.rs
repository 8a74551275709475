//! Tag Routes
//!
//! - GET /api/influx/tags - Known locations and device ids

use axum::{extract::State, Json};
use futures_util::future::join_all;
use std::sync::Arc;

use crate::api::dto::TagsResponse;
use crate::api::state::AppState;
use crate::query::tag_values;
use crate::response::{merge_value_sets, parse_value_set};

/// GET /api/influx/tags
///
/// Every tag is enumerated by its own query, all running concurrently. A
/// failed query contributes an empty set instead of failing the request.
pub async fn get_tags(State(state): State<Arc<AppState>>) -> Json<TagsResponse> {
    let query = &state.config.query;

    let (locations, ids) = tokio::join!(
        enumerate(&state, &query.location_tag),
        join_all(query.id_tags.iter().map(|tag| enumerate(&state, tag))),
    );

    Json(TagsResponse {
        ok: true,
        locations,
        ids: merge_value_sets(ids),
    })
}

async fn enumerate(state: &AppState, tag: &str) -> Vec<String> {
    let flux = tag_values(state.bucket(), tag);

    match state.store.query_csv(&flux).await {
        Ok(csv) => parse_value_set(&csv),
        Err(e) => {
            tracing::warn!(tag = %tag, error = %e, "tag enumeration failed");
            Vec::new()
        }
    }
}
