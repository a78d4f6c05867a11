//! Background Tasks Module
//!
//! Work that outlives the request that started it.
//!
//! # Tasks
//! - Revalidation: stale-while-revalidate refreshes written back to the store

mod background;

pub use background::BackgroundTasks;
