//! Error types for the caching layer and the gateway
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    Json,
};
use thiserror::Error;

use crate::fetch::Response;
use crate::models::{ErrorResponse, OfflineResponse};

// == Transport Error ==
/// Failure reported by a [`Transport`](crate::fetch::Transport) before any
/// response was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request URL could not be resolved against the upstream
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Connection refused, reset, DNS failure and similar
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other failure while sending or reading the body
    #[error("request failed: {0}")]
    Request(String),
}

// == Fetch Error ==
/// Error surfaced by [`CachingFetcher::fetch`](crate::fetch::CachingFetcher::fetch).
///
/// Every variant carries the cache key of the request it belongs to.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure or a non-2xx status
    #[error("network error for {key}: {message}")]
    Network {
        key: String,
        /// Upstream status when a response was received
        status: Option<u16>,
        message: String,
        /// The non-2xx response itself, when there was one
        response: Option<Box<Response>>,
    },

    /// The network did not answer within the route's bound
    #[error("network timed out after {after:?} for {key}")]
    Timeout { key: String, after: Duration },

    /// The network failed and no cached copy could stand in
    #[error("no usable cached response for {key}")]
    CacheUnavailable {
        key: String,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Wraps a transport failure.
    pub fn transport(key: impl Into<String>, err: TransportError) -> Self {
        FetchError::Network {
            key: key.into(),
            status: None,
            message: err.to_string(),
            response: None,
        }
    }

    /// Wraps a non-2xx response.
    pub fn status(key: impl Into<String>, response: Response) -> Self {
        FetchError::Network {
            key: key.into(),
            status: Some(response.status),
            message: format!("upstream returned HTTP {}", response.status),
            response: Some(Box::new(response)),
        }
    }

    /// Marks `cause` as having no cached fallback.
    pub fn unavailable(key: impl Into<String>, cause: FetchError) -> Self {
        FetchError::CacheUnavailable {
            key: key.into(),
            source: Box::new(cause),
        }
    }

    /// Cache key of the failed request.
    pub fn key(&self) -> &str {
        match self {
            FetchError::Network { key, .. }
            | FetchError::Timeout { key, .. }
            | FetchError::CacheUnavailable { key, .. } => key,
        }
    }
}

// == IntoResponse Implementations ==
impl IntoResponse for FetchError {
    fn into_response(self) -> HttpResponse {
        match self {
            FetchError::Network {
                response: Some(response),
                ..
            } => (*response).into_response(),
            FetchError::Network { message, .. } => (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new(message)),
            )
                .into_response(),
            FetchError::Timeout { after, .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                Json(ErrorResponse::new(format!(
                    "Upstream timed out after {} ms",
                    after.as_millis()
                ))),
            )
                .into_response(),
            // An upstream that answered is not "offline"; replay its answer
            FetchError::CacheUnavailable { source, key } => match *source {
                FetchError::Network {
                    response: Some(response),
                    ..
                } => (*response).into_response(),
                _ => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(OfflineResponse::new("Data not available offline", key)),
                )
                    .into_response(),
            },
        }
    }
}

// == Api Error ==
/// Errors raised by the `/_cache` admin endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No partition with this name
    #[error("Unknown cache partition: {0}")]
    UnknownPartition(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> HttpResponse {
        let status = match &self {
            ApiError::UnknownPartition(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for admin handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
