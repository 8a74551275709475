//! # KSave Gateway
//!
//! Telemetry gateway in front of an InfluxDB 2.x database. Dashboards send
//! JSON and read JSON; the gateway speaks line protocol and Flux upstream.
//!
//! ## Modules
//!
//! - [`line_protocol`]: JSON payloads to line protocol
//! - [`device`]: device id aliases
//! - [`query`]: Flux script builders and time windows
//! - [`response`]: annotated CSV parsing and device snapshot extraction
//! - [`influx`]: upstream HTTP client
//! - [`api`]: REST API server with Axum
//! - [`config`] / [`logging`]: ambient setup
//!
//! ## Quick Start
//!
//! ```rust
//! use ksave_gateway::device::DeviceResolver;
//! use ksave_gateway::line_protocol::{point_from_json, EncodingOptions};
//!
//! let payload = serde_json::json!({
//!     "measurement": "machines",
//!     "device": "DEV-7",
//!     "fields": { "ia": 1.5 },
//!     "ts": 1700000000
//! });
//!
//! let point = point_from_json(&payload, &DeviceResolver::default()).unwrap();
//! let line = point.encode(&EncodingOptions::generic_write()).unwrap();
//!
//! assert_eq!(
//!     line.as_str(),
//!     "machines,device=Ksave07,device_input=DEV-7 ia=1.5 1700000000"
//! );
//! ```

pub mod api;
pub mod config;
pub mod device;
pub mod influx;
pub mod line_protocol;
pub mod logging;
pub mod query;
pub mod response;

// Re-export top-level types for convenience
pub use line_protocol::{
    encode_batch, point_from_json, Batch, EncodingOptions, FieldValue, LineError, Point,
};

pub use device::{AliasTable, DeviceResolver};

pub use query::{FieldFilter, QueryError, QueryWindow, RelativeRange};

pub use response::{DeviceSnapshot, ResultRow};

pub use influx::{InfluxClient, InfluxError, ServiceStatus, TimeSeriesStore};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, Discovered, LoggingConfig};
