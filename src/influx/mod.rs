//! Time-Series Database Client
//!
//! The gateway talks to the database only through [`TimeSeriesStore`], so
//! handlers can be exercised against an in-memory fake.

mod client;
mod error;

pub use client::{probe_health, InfluxClient, ServiceStatus, TimeSeriesStore};
pub use error::{InfluxError, InfluxResult};
