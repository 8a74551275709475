//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides. The
//! database variables fall back to the `DOCKER_INFLUXDB_INIT_*` names used
//! by the official container image, so a gateway started next to it needs no
//! extra setup.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::device::AliasTable;
use crate::line_protocol::EncodingOptions;
use crate::query::{FieldFilter, RelativeRange, DEFAULT_RANGE};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub influx: InfluxConfig,

    #[serde(default)]
    pub grafana: GrafanaConfig,

    /// Encoding of the generic write endpoint
    #[serde(default)]
    pub encoding: EncodingOptions,

    #[serde(default)]
    pub query: QueryConfig,

    /// Raw device id to canonical id
    #[serde(default)]
    pub aliases: AliasTable,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InfluxConfig {
    #[serde(default = "default_influx_host")]
    pub host: String,

    #[serde(default = "default_org")]
    pub org: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default)]
    pub token: String,

    /// Required `x-write-token` header value for the write endpoint
    pub write_token: Option<String>,

    /// Required `x-seed-token` header value for the seed endpoint
    pub seed_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_status_timeout")]
    pub status_timeout_secs: u64,
}

fn default_influx_host() -> String {
    "http://127.0.0.1:8086".to_string()
}

fn default_org() -> String {
    "K-Energy_Save".to_string()
}

fn default_bucket() -> String {
    "k_db".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_status_timeout() -> u64 {
    2
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: default_influx_host(),
            org: default_org(),
            bucket: default_bucket(),
            token: String::new(),
            write_token: None,
            seed_token: None,
            request_timeout_secs: default_request_timeout(),
            status_timeout_secs: default_status_timeout(),
        }
    }
}

impl InfluxConfig {
    /// Org, bucket and token are all set
    pub fn is_writable(&self) -> bool {
        !self.org.is_empty() && !self.bucket.is_empty() && !self.token.is_empty()
    }
}

/// Dashboard service probed by the status endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GrafanaConfig {
    #[serde(default = "default_grafana_url")]
    pub url: Option<String>,
}

fn default_grafana_url() -> Option<String> {
    Some("http://127.0.0.1:3000".to_string())
}

impl Default for GrafanaConfig {
    fn default() -> Self {
        Self {
            url: default_grafana_url(),
        }
    }
}

/// Read query configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Range used when a request has none or an invalid one
    #[serde(default = "default_range")]
    pub default_range: String,

    /// Field tokens of the current-values query
    #[serde(default)]
    pub field_filter: FieldFilter,

    /// Tag enumerated as locations
    #[serde(default = "default_location_tag")]
    pub location_tag: String,

    /// Tags enumerated (and merged) as device ids
    #[serde(default = "default_id_tags")]
    pub id_tags: Vec<String>,

    /// Tags searched by a device lookup
    #[serde(default = "default_device_tags")]
    pub device_tags: Vec<String>,
}

fn default_range() -> String {
    DEFAULT_RANGE.to_string()
}

fn default_location_tag() -> String {
    "location".to_string()
}

fn default_id_tags() -> Vec<String> {
    vec!["ksave".to_string(), "device".to_string()]
}

fn default_device_tags() -> Vec<String> {
    ["ksave", "device", "host", "machine"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_range: default_range(),
            field_filter: FieldFilter::default(),
            location_tag: default_location_tag(),
            id_tags: default_id_tags(),
            device_tags: default_device_tags(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Result of [`Config::discover`]
#[derive(Debug)]
pub struct Discovered {
    pub config: Config,
    /// File the configuration came from, if any
    pub source: Option<PathBuf>,
    /// Problems met while loading, to be logged once tracing is installed
    pub warnings: Vec<String>,
}

/// Environment variable naming the config file
pub const CONFIG_PATH_VAR: &str = "KSAVE_CONFIG";

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        for warning in config.apply_env_overrides() {
            tracing::warn!("{}", warning);
        }
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        for warning in config.apply_env_overrides() {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// Load from `$KSAVE_CONFIG`, the default locations, or the environment.
    ///
    /// A file named by `$KSAVE_CONFIG` must load; files at the default
    /// locations are skipped with a warning when they fail. Nothing is
    /// logged here: this runs before the subscriber exists, so warnings are
    /// handed back for the caller to emit.
    pub fn discover() -> Result<Discovered, ConfigError> {
        let candidates: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("ksave").join("config.toml")),
            Some(PathBuf::from("/etc/ksave/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::discover_from(env_lookup(CONFIG_PATH_VAR), &candidates, env_lookup)
    }

    /// [`Config::discover`] over explicit inputs
    pub fn discover_from<F>(
        explicit: Option<String>,
        candidates: &[PathBuf],
        lookup: F,
    ) -> Result<Discovered, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        let (mut config, source) = match explicit {
            Some(path) => {
                let path = PathBuf::from(path);
                (Self::load(&path)?, Some(path))
            }
            None => {
                let mut found = None;
                for path in candidates.iter().filter(|p| p.exists()) {
                    match Self::load(path) {
                        Ok(config) => {
                            found = Some((config, path.clone()));
                            break;
                        }
                        Err(e) => {
                            warnings.push(format!("Failed to load config from {:?}: {}", path, e))
                        }
                    }
                }
                match found {
                    Some((config, path)) => (config, Some(path)),
                    None => (Config::default(), None),
                }
            }
        };

        warnings.extend(config.apply_overrides_from(lookup));
        Ok(Discovered {
            config,
            source,
            warnings,
        })
    }

    /// Apply process environment overrides, returning the ones ignored
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides_from(env_lookup)
    }

    /// Apply overrides from `lookup`, which returns a non-empty value or `None`.
    ///
    /// Returns one warning per variable that was set but could not be used.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let first = |names: &[&str]| names.iter().find_map(|n| lookup(*n));

        // Database
        if let Some(host) = first(&["INFLUX_HOST", "DOCKER_INFLUXDB_INIT_HOST"]) {
            self.influx.host = host;
        }
        if let Some(org) = first(&["INFLUX_ORG", "DOCKER_INFLUXDB_INIT_ORG"]) {
            self.influx.org = org;
        }
        if let Some(bucket) = first(&["INFLUX_BUCKET", "DOCKER_INFLUXDB_INIT_BUCKET"]) {
            self.influx.bucket = bucket;
        }
        if let Some(token) = first(&[
            "INFLUX_TOKEN",
            "DOCKER_INFLUXDB_INIT_TOKEN",
            "DOCKER_INFLUXDB_INIT_ADMIN_TOKEN",
        ]) {
            self.influx.token = token;
        }
        if let Some(token) = lookup("INFLUX_WRITE_TOKEN") {
            self.influx.write_token = Some(token);
        }
        if let Some(token) = lookup("INFLUX_SEED_TOKEN") {
            self.influx.seed_token = Some(token);
        }

        // Device aliases are merged over the file table
        if let Some(json) = lookup("DEVICE_ALIASES") {
            match AliasTable::from_json(&json) {
                Ok(table) => self.aliases.extend(table),
                Err(e) => warnings.push(format!("Ignoring DEVICE_ALIASES: {}", e)),
            }
        }

        if let Some(url) = lookup("GRAFANA_URL") {
            self.grafana.url = Some(url);
        }

        // API
        if let Some(host) = lookup("KSAVE_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("KSAVE_API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => warnings.push(format!("Ignoring KSAVE_API_PORT: {:?} is not a port", port)),
            }
        }

        // Logging
        if let Some(level) = lookup("KSAVE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("KSAVE_LOG_FORMAT") {
            self.logging.format = format;
        }

        warnings
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if RelativeRange::parse(&self.query.default_range).is_none() {
            return Err(ConfigError::Invalid(format!(
                "query.default_range must look like -15m, -6h or -7d, got {:?}",
                self.query.default_range
            )));
        }

        if !self.influx.host.starts_with("http://") && !self.influx.host.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "influx.host must be an http(s) URL, got {:?}",
                self.influx.host
            )));
        }

        Ok(())
    }

    /// The validated default range
    pub fn default_range(&self) -> RelativeRange {
        RelativeRange::parse(&self.query.default_range).unwrap_or_default()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# ksave gateway configuration
#
# Environment variables override these settings:
# - INFLUX_HOST, INFLUX_ORG, INFLUX_BUCKET, INFLUX_TOKEN
#   (each falls back to the DOCKER_INFLUXDB_INIT_* variable)
# - INFLUX_WRITE_TOKEN, INFLUX_SEED_TOKEN
# - DEVICE_ALIASES (JSON object, merged over [aliases])
# - GRAFANA_URL
# - KSAVE_API_HOST, KSAVE_API_PORT
# - KSAVE_LOG_LEVEL, KSAVE_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8082

# Allowed CORS origins (empty allows any origin)
cors_origins = []

# Maximum request body size (bytes)
max_body_bytes = 10485760

[influx]
# Database URL
host = "http://127.0.0.1:8086"

# Organization and bucket written to and queried
org = "K-Energy_Save"
bucket = "k_db"

# API token (sent as "Authorization: Token ...")
token = ""

# Optional header guards
# write_token = "change-me"
# seed_token = "change-me"

# Timeouts (seconds)
request_timeout_secs = 30
status_timeout_secs = 2

[grafana]
url = "http://127.0.0.1:3000"

[encoding]
# Generic write endpoint: "omit" or "quote_empty"
nulls = "omit"

# "float" or "integer_suffix"
numbers = "float"

[query]
# Range used when a request gives none (or an invalid one)
default_range = "-1h"

# Field name tokens of the current-values query
field_filter = ["current", "amp", "i", "ia", "ib", "ic"]

location_tag = "location"
id_tags = ["ksave", "device"]
device_tags = ["ksave", "device", "host", "machine"]

[aliases]
# "meter-a" = "Ksave03"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
