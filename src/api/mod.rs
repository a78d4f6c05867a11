//! API Module
//!
//! HTTP surface of the gateway.
//!
//! # Endpoints
//! - `GET /_cache/health` - Health check endpoint
//! - `GET /_cache/stats` - Per-partition cache statistics
//! - `DELETE /_cache/:partition` - Clear one partition
//! - `DELETE /_cache/:partition/entry?url=` - Drop one stored GET response
//! - `POST /_cache/:partition/precache` - Fetch and store a list of URLs
//! - anything else - proxied to the upstream through the caching fetchers

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
