//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::device::DeviceResolver;
use crate::influx::{InfluxClient, InfluxResult, TimeSeriesStore};
use crate::query::RelativeRange;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Database behind the gateway
    pub store: Arc<dyn TimeSeriesStore>,
    /// Device id resolution over the configured alias table
    pub resolver: DeviceResolver,
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Validated fallback range of read queries
    pub default_range: RelativeRange,
    /// Client for probing services other than the database
    pub http: reqwest::Client,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state over an existing store
    pub fn new(config: Config, store: Arc<dyn TimeSeriesStore>) -> Self {
        let resolver = DeviceResolver::new(Arc::new(config.aliases.clone()));
        let default_range = config.default_range();

        Self {
            store,
            resolver,
            config: Arc::new(config),
            default_range,
            http: reqwest::Client::new(),
            start_time: Instant::now(),
        }
    }

    /// Create state talking to the configured database
    pub fn from_config(config: Config) -> InfluxResult<Self> {
        let store = Arc::new(InfluxClient::new(&config.influx)?);
        Ok(Self::new(config, store))
    }

    /// Bucket written to and queried
    pub fn bucket(&self) -> &str {
        &self.config.influx.bucket
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
