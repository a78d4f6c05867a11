//! Cache Store Module
//!
//! Bounded key-value storage with FIFO eviction and lazy expiration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, CachedResponse, Clock, InsertionOrder, SystemClock};

// == Lookup ==
/// Result of a freshness-agnostic read.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub entry: CacheEntry,
    /// Whether the entry is still within its max age
    pub fresh: bool,
}

// == Cache Store ==
/// Capacity-bounded store whose entries expire on read.
///
/// Eviction follows insertion order only; reads never change which entry is
/// evicted next.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Insertion order tracker
    order: InsertionOrder,
    /// Store counters
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
    /// Time source for stamping and aging entries
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store on the system clock.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Creates a store that reads time from `clock`.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: InsertionOrder::new(),
            stats: CacheStats::new(capacity),
            capacity,
            clock,
        }
    }

    // == Set ==
    /// Inserts or overwrites an entry stamped with the current time.
    ///
    /// Inserting a new key into a full store evicts exactly the oldest
    /// inserted entry first. An overwrite never evicts and makes the key the
    /// newest insertion.
    pub fn set(&mut self, key: String, value: CachedResponse, max_age: Duration) {
        let is_overwrite = self.entries.contains_key(&key);

        if !is_overwrite && self.entries.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
                debug!(key = %evicted, "Evicted oldest cache entry");
            }
        }

        let entry = CacheEntry::new(key.clone(), value, self.clock.now_ms(), max_age);
        self.entries.insert(key.clone(), entry);
        self.order.insert(&key);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the entry if present and fresh.
    ///
    /// A stale entry is removed as a side effect and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        if self.evict_if_stale(key) {
            self.stats.record_miss();
            return None;
        }

        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                let ttl_remaining_ms = entry.ttl_remaining_ms(self.clock.now_ms());
                debug!(key = %key, ttl_remaining_ms, "Cache hit");
                Some(entry.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Same freshness semantics as `get`, without cloning the value.
    pub fn has(&mut self, key: &str) -> bool {
        if self.evict_if_stale(key) {
            self.stats.record_miss();
            return false;
        }

        let present = self.entries.contains_key(key);
        if present {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        present
    }

    // == Peek ==
    /// Returns the entry regardless of freshness, without removing it.
    ///
    /// Used for degraded fallbacks; the caller learns whether the entry is
    /// fresh from [`Lookup::fresh`]. A fresh entry counts as a hit; a stale
    /// or absent one counts as a miss, and a stale one also as stale-served.
    pub fn peek(&mut self, key: &str) -> Option<Lookup> {
        let now = self.clock.now_ms();
        let Some(entry) = self.entries.get(key).cloned() else {
            self.stats.record_miss();
            return None;
        };

        let fresh = entry.is_fresh(now);
        if fresh {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
            self.stats.record_stale_served();
        }
        Some(Lookup { entry, fresh })
    }

    // == Delete ==
    /// Removes an entry. Returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Clear ==
    /// Drops all entries. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats.set_total_entries(0);
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    /// Removes `key` if it is stale. Returns whether it was removed.
    fn evict_if_stale(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let stale = self
            .entries
            .get(key)
            .map(|entry| !entry.is_fresh(now))
            .unwrap_or(false);

        if stale {
            self.entries.remove(key);
            self.order.remove(key);
            self.stats.record_expiration();
            self.stats.set_total_entries(self.entries.len());
            debug!(key = %key, "Cache entry expired, removing");
        }
        stale
    }
}
