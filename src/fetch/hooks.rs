//! Callbacks for code that reports request progress (loading indicators,
//! offline banners). All methods default to no-ops.

use tracing::{debug, info, warn};

use super::{Request, Response};
use crate::error::FetchError;

pub trait FetchHooks: Send + Sync {
    /// Called once before the strategy runs.
    fn on_request_start(&self, _request: &Request) {}

    /// Called once with the final outcome.
    fn on_request_end(&self, _request: &Request, _outcome: Result<&Response, &FetchError>) {}

    /// Called when the caller receives a cached response; `stale` is true for
    /// entries past their max age.
    fn on_served_from_cache(&self, _request: &Request, _stale: bool) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl FetchHooks for NoopHooks {}

/// Hooks that log through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl FetchHooks for TracingHooks {
    fn on_request_start(&self, request: &Request) {
        debug!(method = %request.method, url = %request.url, "Request started");
    }

    fn on_request_end(&self, request: &Request, outcome: Result<&Response, &FetchError>) {
        match outcome {
            Ok(response) => debug!(
                method = %request.method,
                url = %request.url,
                status = response.status,
                served_from = %response.served_from,
                "Request finished"
            ),
            Err(err) => warn!(
                method = %request.method,
                url = %request.url,
                error = %err,
                "Request failed"
            ),
        }
    }

    fn on_served_from_cache(&self, request: &Request, stale: bool) {
        if stale {
            info!(url = %request.url, "Serving stale cached response");
        } else {
            debug!(url = %request.url, "Serving cached response");
        }
    }
}
