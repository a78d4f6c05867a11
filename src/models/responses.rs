//! Response DTOs for the gateway API
//!
//! Defines the structure of outgoing JSON bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Stats of one partition
#[derive(Debug, Clone, Serialize)]
pub struct PartitionStats {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub stale_served: u64,
    pub total_entries: usize,
    pub capacity: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl PartitionStats {
    pub fn new(name: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            name: name.into(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            stale_served: stats.stale_served,
            total_entries: stats.total_entries,
            capacity: stats.capacity,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for GET /_cache/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub partitions: Vec<PartitionStats>,
}

/// Response body for DELETE /_cache/:partition
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub partition: String,
}

impl ClearResponse {
    pub fn new(partition: impl Into<String>) -> Self {
        let partition = partition.into();
        Self {
            message: format!("Partition '{}' cleared", partition),
            partition,
        }
    }
}

/// Response body for DELETE /_cache/:partition/entry
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub partition: String,
    pub url: String,
    /// Whether an entry existed and was dropped
    pub removed: bool,
}

/// Response body for POST /_cache/:partition/precache
#[derive(Debug, Clone, Serialize)]
pub struct PrecacheResponse {
    pub partition: String,
    pub requested: usize,
    pub stored: usize,
}

/// Response body for the health endpoint (GET /_cache/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Body returned when neither the network nor the cache can answer
#[derive(Debug, Clone, Serialize)]
pub struct OfflineResponse {
    pub error: String,
    /// Always false: no cached copy was available
    pub cached: bool,
    /// Unix milliseconds
    pub timestamp: i64,
    /// Cache key of the failed request
    pub key: String,
}

impl OfflineResponse {
    pub fn new(error: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            cached: false,
            timestamp: chrono::Utc::now().timestamp_millis(),
            key: key.into(),
        }
    }
}

/// Error response body for admin and gateway failures
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
