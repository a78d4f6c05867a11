//! Forge Cache - an HTTP response caching gateway
//!
//! Sits between clients and an application server, answering GET requests
//! from bounded in-memory stores according to per-route strategies
//! (network-only, cache-first, network-first, stale-while-revalidate).

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheStore;
pub use config::Config;
pub use error::FetchError;
pub use fetch::{CachingFetcher, Request, Response, Strategy};
pub use gateway::Gateway;
