//! Cache Module
//!
//! Provides in-memory response storage with lazy expiration and FIFO
//! eviction.

mod clock;
mod entry;
mod fifo;
mod stats;
mod store;


use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CachedResponse};
pub use fifo::InsertionOrder;
pub use stats::CacheStats;
pub use store::{CacheStore, Lookup};

/// Store handle shared between a fetcher and its background revalidations.
pub type SharedStore = Arc<RwLock<CacheStore>>;

/// Wraps a store for sharing.
pub fn shared(store: CacheStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}
