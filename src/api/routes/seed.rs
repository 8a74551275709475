//! Demo Seed Route
//!
//! - POST /api/influx/seed - Write five demo machines

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::SeedResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::guard::{require_token, SEED_TOKEN_HEADER};
use crate::api::state::AppState;
use crate::line_protocol::{encode_batch, EncodingOptions, Point};

/// A machine of the demo fleet
#[derive(Debug, Clone, Copy)]
pub struct DemoMachine {
    pub id: &'static str,
    pub site: &'static str,
    pub status: &'static str,
    pub power: f64,
}

pub const DEMO_MACHINES: &[DemoMachine] = &[
    DemoMachine { id: "Ksave01", site: "Site A", status: "OK", power: 120.0 },
    DemoMachine { id: "Ksave02", site: "Site B", status: "OK", power: 118.0 },
    DemoMachine { id: "Ksave03", site: "Site D", status: "Warning", power: 130.0 },
    DemoMachine { id: "Ksave04", site: "Site C", status: "OK", power: 95.0 },
    DemoMachine { id: "Ksave05", site: "Site E", status: "OK", power: 150.0 },
];

/// POST /api/influx/seed
pub async fn seed_demo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<SeedResponse>> {
    let influx = &state.config.influx;
    if influx.org.is_empty() {
        return Err(ApiError::Validation("INFLUX_ORG not configured".to_string()));
    }
    if influx.token.is_empty() {
        return Err(ApiError::Validation("INFLUX_TOKEN not configured".to_string()));
    }

    require_token(&headers, SEED_TOKEN_HEADER, influx.seed_token.as_deref())?;

    let ts = Utc::now().timestamp();
    let points = DEMO_MACHINES
        .iter()
        .flat_map(|machine| machine.points(ts))
        .map(Ok);
    let batch = encode_batch(points, &EncodingOptions::generic_write())?;

    state.store.write_lines(batch.body()).await?;

    tracing::info!(machines = DEMO_MACHINES.len(), lines = batch.written(), "demo data seeded");

    Ok(Json(SeedResponse {
        ok: true,
        written: DEMO_MACHINES.len(),
        bucket: state.bucket().to_string(),
    }))
}

impl DemoMachine {
    /// Stable ten-digit series number derived from the id
    pub fn series_no(&self) -> u64 {
        u64::from(id_hash(self.id).unsigned_abs()) % 9_000_000_000 + 1_000_000_000
    }

    /// Total harmonic distortion in [1, 6), fixed per machine
    fn thd(&self) -> f64 {
        round_to(1.0 + f64::from(id_hash(self.id).unsigned_abs() % 500) / 100.0, 2)
    }

    /// `machine_status`, `machines` and `power_metrics` lines of this machine
    pub fn points(&self, ts: i64) -> [Point; 3] {
        let power = self.power;
        let kwh = round_to(power / 1000.0, 3);
        let p = round_to(power, 3);
        let q = round_to(p * 0.2, 3);
        let s = round_to((p * p + q * q).sqrt(), 3);
        let pf = round_to(p / s, 3);
        let thd = self.thd();

        let electrical = |point: Point| {
            point
                .field("kWh", kwh)
                .field("P", p)
                .field("Q", q)
                .field("S", s)
                .field("PF", pf)
                .field("THD", thd)
                .field("F", 50.0)
        };

        let status = Point::new("machine_status")
            .tag("ksave", self.id)
            .tag("id", self.id)
            .tag("site", self.site)
            .tag("status", self.status)
            .field("power", power)
            .field("series_no", self.series_no().to_string())
            .timestamp(ts);

        let machines = electrical(
            Point::new("machines")
                .tag("site", self.site)
                .tag("device", self.id)
                .tag("user", "operator")
                .tag("role", "admin")
                .field("current", round_to(power / 1000.0, 3))
                .field("power_before", p)
                .field("power_metrics", round_to(power / 1000.0 / 100.0, 6)),
        )
        .timestamp(ts);

        let summary = electrical(
            Point::new("power_metrics")
                .tag("site", self.site)
                .tag("device", self.id)
                .field("avg_power", round_to(power * 0.102, 3))
                .field("max_power", round_to(power * 0.125, 3)),
        )
        .timestamp(ts);

        [status, machines, summary]
    }
}

/// 32-bit string hash (`h = h * 31 + byte`, wrapping)
fn id_hash(id: &str) -> i32 {
    id.bytes().fold(0i32, |hash, byte| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(byte))
    })
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}
