//! Cache Entry Module
//!
//! Defines cached responses and the entries that age them.

use std::time::Duration;

use bytes::Bytes;

use crate::fetch::Headers;

// == Cached Response ==
/// Response payload held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Raw body bytes
    pub body: Bytes,
}

// == Cache Entry ==
/// Represents a single cache entry with value and age metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request key (method + URL + body digest)
    pub key: String,
    /// The stored response
    pub value: CachedResponse,
    /// Insertion timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Age after which the entry is stale
    pub max_age: Duration,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped at `stored_at`.
    pub fn new(key: String, value: CachedResponse, stored_at: u64, max_age: Duration) -> Self {
        Self {
            key,
            value,
            stored_at,
            max_age,
        }
    }

    // == Age ==
    /// Milliseconds elapsed since the entry was stored.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.stored_at)
    }

    // == Is Fresh ==
    /// Checks whether the entry is still within its max age.
    ///
    /// Boundary condition: an entry whose age equals `max_age` exactly is
    /// still fresh; it goes stale one millisecond later.
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        self.age_ms(now_ms) <= self.max_age.as_millis() as u64
    }

    /// Remaining freshness in milliseconds, 0 once stale.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        (self.max_age.as_millis() as u64).saturating_sub(self.age_ms(now_ms))
    }
}
