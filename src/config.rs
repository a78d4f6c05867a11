//! Configuration Module
//!
//! Server settings come from environment variables; cache partitions and
//! their route tables come from an optional JSON file, falling back to the
//! built-in workshop layout.

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::fetch::{PatternKind, RouteRuleConfig, Strategy};

const MINUTE_MS: u64 = 60 * 1000;
const DAY_MS: u64 = 24 * 60 * MINUTE_MS;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Base URL of the application server behind the gateway
    pub upstream_url: String,
    /// Network bound in milliseconds for networkFirst routes without their own
    pub default_timeout_ms: u64,
    /// JSON file describing cache partitions
    pub routes_file: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `UPSTREAM_URL` - Upstream base URL (default: http://127.0.0.1:8000)
    /// - `DEFAULT_TIMEOUT_MS` - networkFirst timeout (default: 3000)
    /// - `ROUTES_FILE` - Partition/route JSON file (default: built-in layout)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            default_timeout_ms: env::var("DEFAULT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_timeout_ms),
            routes_file: env::var("ROUTES_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Partitions from `routes_file`, or the built-in layout when unset.
    pub fn partitions(&self) -> Result<Vec<PartitionConfig>, ConfigError> {
        match &self.routes_file {
            Some(path) => load_partitions(path),
            None => Ok(default_partitions()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            upstream_url: "http://127.0.0.1:8000".to_string(),
            default_timeout_ms: 3000,
            routes_file: None,
        }
    }
}

// == Partition Configuration ==
/// One cache partition: a bounded store plus the routes it serves.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionConfig {
    pub name: String,
    pub capacity: usize,
    /// URLs fetched into the partition at startup
    #[serde(default)]
    pub precache: Vec<String>,
    pub routes: Vec<RouteRuleConfig>,
}

#[derive(Debug, Deserialize)]
struct RoutesFile {
    partitions: Vec<PartitionConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid partition configuration: {0}")]
    Invalid(String),
}

/// Reads and validates a partition file.
pub fn load_partitions(path: &Path) -> Result<Vec<PartitionConfig>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: RoutesFile = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&file.partitions)?;
    Ok(file.partitions)
}

fn validate(partitions: &[PartitionConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for partition in partitions {
        if partition.name.is_empty() {
            return Err(ConfigError::Invalid("partition name cannot be empty".into()));
        }
        if !seen.insert(partition.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate partition name '{}'",
                partition.name
            )));
        }
        if partition.capacity == 0 {
            return Err(ConfigError::Invalid(format!(
                "partition '{}' must have a capacity of at least 1",
                partition.name
            )));
        }
    }
    Ok(())
}

fn route(
    pattern: &str,
    kind: PatternKind,
    strategy: Strategy,
    max_age_millis: u64,
) -> RouteRuleConfig {
    RouteRuleConfig {
        pattern: pattern.to_string(),
        kind,
        strategy,
        max_age_millis,
        timeout_millis: None,
    }
}

/// Built-in layout: static assets, API data, and HTML pages.
pub fn default_partitions() -> Vec<PartitionConfig> {
    use PatternKind::{Prefix, Regex};
    use Strategy::*;

    vec![
        PartitionConfig {
            name: "static".to_string(),
            capacity: 50,
            precache: [
                "/static/frontend/css/main.css",
                "/static/frontend/css/responsive.css",
                "/static/frontend/js/main.js",
                "/static/frontend/js/api-integration.js",
                "/static/frontend/vendor/chart.min.js",
                "/static/frontend/img/favicon.ico",
                "/static/frontend/manifest.json",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            routes: vec![
                route("/static/", Prefix, CacheFirst, DAY_MS),
                route(
                    r"\.(css|js|png|jpg|jpeg|gif|svg|ico|woff|woff2)$",
                    Regex,
                    CacheFirst,
                    DAY_MS,
                ),
            ],
        },
        PartitionConfig {
            name: "api".to_string(),
            capacity: 200,
            precache: Vec::new(),
            routes: vec![
                route("/api/v1/dashboard/", Prefix, NetworkFirst, 5 * MINUTE_MS),
                route("/api/v1/clients/", Prefix, StaleWhileRevalidate, 10 * MINUTE_MS),
                route("/api/v1/products/", Prefix, StaleWhileRevalidate, 15 * MINUTE_MS),
                route("/api/v1/equipment/", Prefix, StaleWhileRevalidate, 15 * MINUTE_MS),
                route("/api/v1/auth/", Prefix, NetworkOnly, 0),
                route("/api/", Prefix, NetworkOnly, 0),
            ],
        },
        PartitionConfig {
            name: "pages".to_string(),
            capacity: 100,
            precache: Vec::new(),
            routes: vec![route("/$", Regex, NetworkFirst, 5 * MINUTE_MS)],
        },
    ]
}
