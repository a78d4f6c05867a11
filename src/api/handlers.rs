//! API Handlers
//!
//! The proxy handler that feeds every request through the gateway, and the
//! `/_cache` admin handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response as HttpResponse},
    Json,
};
use bytes::Bytes;
use tracing::warn;

use crate::error::{ApiError, Result};
use crate::fetch::{CachingFetcher, Headers, Request, Response};
use crate::gateway::Gateway;
use crate::models::{
    ClearResponse, HealthResponse, InvalidateQuery, InvalidateResponse, PartitionStats,
    PrecacheRequest, PrecacheResponse, StatsResponse,
};

/// Response header naming where the body came from.
pub const SERVED_FROM_HEADER: &str = "x-served-from";
/// Response header present on stale cache responses.
pub const STALE_HEADER: &str = "x-cache-stale";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    fn partition(&self, name: &str) -> Result<&CachingFetcher> {
        self.gateway
            .partition(name)
            .ok_or_else(|| ApiError::UnknownPartition(name.to_string()))
    }
}

// == Proxy ==
impl IntoResponse for Response {
    fn into_response(self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!(header = %name, "Dropping invalid response header"),
            }
        }
        headers.insert(
            SERVED_FROM_HEADER,
            HeaderValue::from_static(self.served_from.as_str()),
        );
        if self.stale {
            headers.insert(STALE_HEADER, HeaderValue::from_static("true"));
        }

        (status, headers, Body::from(self.body)).into_response()
    }
}

/// Fallback handler: every non-admin request goes through the gateway.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    header_map: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let headers: Headers = header_map
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let request = Request {
        method: method.as_str().to_string(),
        url,
        headers,
        body: if body.is_empty() { None } else { Some(body) },
    };

    match state.gateway.fetch(&request).await {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}

// == Admin ==
/// Handler for GET /_cache/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /_cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let partitions = state
        .gateway
        .stats()
        .await
        .iter()
        .map(|(name, stats)| PartitionStats::new(name.clone(), stats))
        .collect();

    Json(StatsResponse { partitions })
}

/// Handler for DELETE /_cache/:partition
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
) -> Result<Json<ClearResponse>> {
    state.partition(&partition)?.clear().await;
    Ok(Json(ClearResponse::new(partition)))
}

/// Handler for DELETE /_cache/:partition/entry?url=...
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    Query(query): Query<InvalidateQuery>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let removed = state
        .partition(&partition)?
        .invalidate(&Request::get(query.url.clone()))
        .await;

    Ok(Json(InvalidateResponse {
        partition,
        url: query.url,
        removed,
    }))
}

/// Handler for POST /_cache/:partition/precache
pub async fn precache_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    Json(req): Json<PrecacheRequest>,
) -> Result<Json<PrecacheResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let requested = req.urls.len();
    let stored = state.partition(&partition)?.precache(req.urls).await;

    Ok(Json(PrecacheResponse {
        partition,
        requested,
        stored,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::fetch::{NoopHooks, ServedFrom, Transport};
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedTransport;

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, request: &Request) -> std::result::Result<Response, TransportError> {
            Ok(Response::new(200, format!("upstream {}", request.url))
                .with_header("content-type", "text/plain"))
        }
    }

    fn test_state() -> AppState {
        let gateway = Gateway::from_config(
            &crate::config::default_partitions(),
            Arc::new(FixedTransport),
            Arc::new(NoopHooks),
            Duration::from_secs(3),
        )
        .unwrap();
        AppState::new(gateway)
    }

    #[test]
    fn test_response_headers_mark_cache() {
        let mut response = Response::new(200, "x").with_header("content-type", "text/css");
        response.served_from = ServedFrom::Cache;
        response.stale = true;

        let http = response.into_response();
        assert_eq!(http.headers()[SERVED_FROM_HEADER], "cache");
        assert_eq!(http.headers()[STALE_HEADER], "true");
        assert_eq!(http.headers()["content-type"], "text/css");
    }

    #[test]
    fn test_response_headers_fresh_network() {
        let http = Response::new(201, "x").into_response();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()[SERVED_FROM_HEADER], "network");
        assert!(http.headers().get(STALE_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let state = test_state();
        let url = "/static/frontend/css/main.css";
        state.gateway.fetch(&Request::get(url)).await.unwrap();

        let query = InvalidateQuery {
            url: url.to_string(),
        };
        let response = invalidate_handler(
            State(state.clone()),
            Path("static".to_string()),
            Query(query),
        )
        .await
        .unwrap();

        assert!(response.removed);
        assert_eq!(state.gateway.partition("static").unwrap().stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_clear_unknown_partition() {
        let result = clear_handler(State(test_state()), Path("nope".to_string())).await;
        assert!(matches!(result, Err(ApiError::UnknownPartition(_))));
    }

    #[tokio::test]
    async fn test_precache_handler() {
        let state = test_state();
        let req = PrecacheRequest {
            urls: vec!["/static/a.css".to_string(), "/static/b.js".to_string()],
        };

        let response = precache_handler(State(state.clone()), Path("static".to_string()), Json(req))
            .await
            .unwrap();

        assert_eq!(response.requested, 2);
        assert_eq!(response.stored, 2);
    }

    #[tokio::test]
    async fn test_precache_handler_invalid() {
        let req = PrecacheRequest { urls: vec![] };
        let result =
            precache_handler(State(test_state()), Path("static".to_string()), Json(req)).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(test_state())).await;
        let names: Vec<&str> = response.partitions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["static", "api", "pages"]);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
