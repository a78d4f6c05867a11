//! Cache Statistics Module
//!
//! Tracks store activity: hits, misses, evictions, lazy expirations and
//! stale fallbacks.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of store counters.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh entries returned by `get`/`has`
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Entries dropped because the store was full
    pub evictions: u64,
    /// Entries removed lazily after going stale
    pub expirations: u64,
    /// Stale entries handed out as fallbacks
    pub stale_served: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates stats for a store of the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_stale_served(&mut self) {
        self.stale_served += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
