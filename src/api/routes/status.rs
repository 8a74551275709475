//! Status Route
//!
//! - GET /api/status - Health of the database and the dashboard service

use axum::{extract::State, Json};
use std::sync::Arc;
use std::time::Duration;

use crate::api::dto::{Services, StatusResponse};
use crate::api::state::AppState;
use crate::influx::probe_health;

/// GET /api/status
///
/// Always 200; each service reports its own `ok`.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let timeout = Duration::from_secs(state.config.influx.status_timeout_secs);

    let grafana = async {
        match &state.config.grafana.url {
            Some(url) => {
                let url = format!("{}/api/health", url.trim_end_matches('/'));
                Some(probe_health(&state.http, &url, timeout).await)
            }
            None => None,
        }
    };

    let (influx, grafana) = tokio::join!(state.store.health(), grafana);

    Json(StatusResponse {
        services: Services { influx, grafana },
    })
}
