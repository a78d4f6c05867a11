//! Integration Tests for the gateway
//!
//! Runs a real upstream server on loopback and drives the gateway router
//! through full request/response cycles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header::SET_COOKIE, Request, StatusCode},
    routing::get,
    Json, Router,
};
use forge_cache::{
    api::create_router, config::default_partitions, fetch::HttpTransport, fetch::NoopHooks,
    AppState, Gateway,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_test::assert_ok;
use tower::ServiceExt;

// == Upstream ==

#[derive(Default)]
struct Upstream {
    hits: AtomicUsize,
    failing: AtomicBool,
}

impl Upstream {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn versioned(State(upstream): State<Arc<Upstream>>) -> (StatusCode, Json<Value>) {
    let version = upstream.hits.fetch_add(1, Ordering::SeqCst) + 1;
    if upstream.failing.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "upstream down" })),
        );
    }
    (StatusCode::OK, Json(json!({ "version": version })))
}

async fn login() -> ([(axum::http::HeaderName, &'static str); 2], &'static str) {
    (
        [
            (SET_COOKIE, "csrftoken=abc; Path=/"),
            (SET_COOKIE, "sessionid=xyz; Path=/"),
        ],
        "ok",
    )
}

async fn spawn_upstream() -> (String, Arc<Upstream>) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/api/v1/clients/", get(versioned))
        .route("/api/v1/dashboard/", get(versioned))
        .route("/api/v1/workorders/", get(versioned).post(versioned))
        .route("/static/frontend/css/main.css", get(versioned))
        .route("/api/v1/auth/login/", get(login))
        .with_state(upstream.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), upstream)
}

/// Base URL of a port nothing listens on.
async fn closed_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// == Helper Functions ==

fn create_app(base_url: &str) -> (Router, AppState) {
    let transport = assert_ok!(HttpTransport::new(base_url));
    let gateway = Gateway::from_config(
        &default_partitions(),
        Arc::new(transport),
        Arc::new(NoopHooks),
        Duration::from_millis(500),
    )
    .unwrap();
    let state = AppState::new(gateway);
    (create_router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn served_from(response: &axum::response::Response) -> &str {
    response.headers()["x-served-from"].to_str().unwrap()
}

// == Strategy Tests ==

#[tokio::test]
async fn test_cache_first_serves_from_cache() {
    let (base, upstream) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    let first = send(&app, "GET", "/static/frontend/css/main.css").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(served_from(&first), "network");

    let second = send(&app, "GET", "/static/frontend/css/main.css").await;
    assert_eq!(served_from(&second), "cache");
    assert_eq!(body_to_json(second.into_body()).await["version"], 1);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_stale_while_revalidate_refreshes_in_background() {
    let (base, upstream) = spawn_upstream().await;
    let (app, state) = create_app(&base);

    let first = send(&app, "GET", "/api/v1/clients/").await;
    assert_eq!(served_from(&first), "network");
    assert_eq!(body_to_json(first.into_body()).await["version"], 1);

    let second = send(&app, "GET", "/api/v1/clients/").await;
    assert_eq!(served_from(&second), "cache");
    assert_eq!(body_to_json(second.into_body()).await["version"], 1);

    state.gateway.background().settle().await;
    assert_eq!(upstream.hits(), 2);

    let third = send(&app, "GET", "/api/v1/clients/").await;
    assert_eq!(served_from(&third), "cache");
    assert_eq!(body_to_json(third.into_body()).await["version"], 2);
}

#[tokio::test]
async fn test_network_first_falls_back_on_upstream_error() {
    let (base, upstream) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    let fresh = send(&app, "GET", "/api/v1/dashboard/").await;
    assert_eq!(served_from(&fresh), "network");

    upstream.failing.store(true, Ordering::SeqCst);

    let fallback = send(&app, "GET", "/api/v1/dashboard/").await;
    assert_eq!(fallback.status(), StatusCode::OK);
    assert_eq!(served_from(&fallback), "cache");
    assert_eq!(body_to_json(fallback.into_body()).await["version"], 1);
}

#[tokio::test]
async fn test_post_bypasses_cache() {
    let (base, upstream) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    for _ in 0..2 {
        let response = send(&app, "POST", "/api/v1/workorders/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(served_from(&response), "network");
    }
    assert_eq!(upstream.hits(), 2);

    let get = send(&app, "GET", "/api/v1/workorders/").await;
    assert_eq!(served_from(&get), "network");
    assert_eq!(upstream.hits(), 3);
}

#[tokio::test]
async fn test_every_set_cookie_reaches_the_client() {
    let (base, _) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    let response = send(&app, "GET", "/api/v1/auth/login/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies, vec!["csrftoken=abc; Path=/", "sessionid=xyz; Path=/"]);
}

#[tokio::test]
async fn test_upstream_status_is_replayed() {
    let (base, _) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    let response = send(&app, "GET", "/api/v1/products/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(served_from(&response), "network");
}

#[tokio::test]
async fn test_offline_without_cache_returns_503() {
    let base = closed_upstream().await;
    let (app, _) = create_app(&base);

    let response = send(&app, "GET", "/api/v1/dashboard/").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cached"], false);
    assert_eq!(json["error"], "Data not available offline");
    assert!(json["key"].as_str().unwrap().starts_with("GET:/api/v1/dashboard/"));
}

#[tokio::test]
async fn test_passthrough_failure_is_bad_gateway() {
    let base = closed_upstream().await;
    let (app, _) = create_app(&base);

    let response = send(&app, "GET", "/admin/login").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// == Admin Endpoint Tests ==

#[tokio::test]
async fn test_stats_reflect_traffic() {
    let (base, _) = spawn_upstream().await;
    let (app, state) = create_app(&base);

    send(&app, "GET", "/static/frontend/css/main.css").await;
    send(&app, "GET", "/static/frontend/css/main.css").await;
    for _ in 0..3 {
        send(&app, "GET", "/api/v1/clients/").await;
    }
    state.gateway.background().settle().await;

    let response = send(&app, "GET", "/_cache/stats").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let partitions = json["partitions"].as_array().unwrap();
    let static_stats = partitions.iter().find(|p| p["name"] == "static").unwrap();
    assert_eq!(static_stats["hits"], 1);
    assert_eq!(static_stats["misses"], 1);
    assert_eq!(static_stats["total_entries"], 1);
    assert_eq!(static_stats["capacity"], 50);

    let api_stats = partitions.iter().find(|p| p["name"] == "api").unwrap();
    assert_eq!(api_stats["hits"], 2);
    assert_eq!(api_stats["misses"], 1);
    assert!(api_stats["hit_rate"].as_f64().unwrap() > 0.6);
}

#[tokio::test]
async fn test_clear_partition() {
    let (base, upstream) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    send(&app, "GET", "/static/frontend/css/main.css").await;

    let response = send(&app, "DELETE", "/_cache/static").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["partition"], "static");

    let refetched = send(&app, "GET", "/static/frontend/css/main.css").await;
    assert_eq!(served_from(&refetched), "network");
    assert_eq!(upstream.hits(), 2);
}

#[tokio::test]
async fn test_invalidate_entry() {
    let (base, _) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    send(&app, "GET", "/api/v1/clients/").await;

    let response = send(&app, "DELETE", "/_cache/api/entry?url=/api/v1/clients/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["removed"], true);

    let again = send(&app, "DELETE", "/_cache/api/entry?url=/api/v1/clients/").await;
    assert_eq!(body_to_json(again.into_body()).await["removed"], false);
}

#[tokio::test]
async fn test_precache_partition() {
    let (base, upstream) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/_cache/static/precache")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"urls":["/static/frontend/css/main.css","/static/missing.js"]}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["requested"], 2);
    assert_eq!(json["stored"], 1);

    let cached = send(&app, "GET", "/static/frontend/css/main.css").await;
    assert_eq!(served_from(&cached), "cache");
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_unknown_partition() {
    let (base, _) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    let response = send(&app, "DELETE", "/_cache/nonexistent").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let (base, _) = spawn_upstream().await;
    let (app, _) = create_app(&base);

    let response = send(&app, "GET", "/_cache/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["status"], "healthy");
}
