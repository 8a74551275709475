//! KSave Gateway Server
//!
//! Run with: cargo run --bin ksave-gateway
//!
//! # Configuration
//!
//! Read from `$KSAVE_CONFIG`, `~/.config/ksave/config.toml`,
//! `/etc/ksave/config.toml` or `./config.toml`, then overridden by:
//! - `INFLUX_HOST`, `INFLUX_ORG`, `INFLUX_BUCKET`, `INFLUX_TOKEN`
//! - `INFLUX_WRITE_TOKEN`, `INFLUX_SEED_TOKEN`
//! - `DEVICE_ALIASES`: JSON object of raw id to canonical id
//! - `GRAFANA_URL`
//! - `KSAVE_API_HOST`, `KSAVE_API_PORT`
//! - `KSAVE_LOG_LEVEL`, `KSAVE_LOG_FORMAT`
//! - `RUST_LOG`: Log filter (wins over `KSAVE_LOG_LEVEL`)

use anyhow::Context;
use ksave_gateway::api::{serve, AppState};
use ksave_gateway::config::Config;
use ksave_gateway::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let discovered = Config::discover()?;
    let config = discovered.config;

    init_tracing(&config.logging).context("failed to install tracing subscriber")?;

    tracing::info!("Starting KSave gateway v{}", env!("CARGO_PKG_VERSION"));
    match &discovered.source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }
    for warning in &discovered.warnings {
        tracing::warn!("{}", warning);
    }
    config.validate()?;

    tracing::info!(
        influx = %config.influx.host,
        org = %config.influx.org,
        bucket = %config.influx.bucket,
        writable = config.influx.is_writable(),
        aliases = config.aliases.len(),
        "Database configured"
    );

    if config.influx.token.is_empty() {
        tracing::warn!("INFLUX_TOKEN not set; writes will be rejected");
    }

    let state = AppState::from_config(config)?;
    serve(state).await?;

    tracing::info!("KSave gateway stopped");
    Ok(())
}
