//! Forge Cache - an HTTP response caching gateway

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forge_cache::api::{create_router, AppState};
use forge_cache::fetch::{HttpTransport, TracingHooks};
use forge_cache::tasks::BackgroundTasks;
use forge_cache::{Config, Gateway};

/// Main entry point for the caching gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration and cache partitions
/// 3. Build one caching fetcher per partition over a shared upstream client
/// 4. Start precaching configured URLs in the background
/// 5. Serve until SIGINT/SIGTERM, then abort outstanding background work
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Forge Cache gateway");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, upstream={}, default_timeout={}ms, routes_file={:?}",
        config.server_port, config.upstream_url, config.default_timeout_ms, config.routes_file
    );

    let partitions = config.partitions().context("loading cache partitions")?;
    let transport = Arc::new(
        HttpTransport::new(&config.upstream_url).context("building upstream client")?,
    );
    info!("Forwarding uncached traffic to {}", transport.base_url());
    let gateway = Gateway::from_config(
        &partitions,
        transport,
        Arc::new(TracingHooks),
        config.default_timeout(),
    )
    .context("compiling route rules")?;

    let state = AppState::new(gateway);
    let background = state.gateway.background().clone();

    for partition in partitions.into_iter().filter(|p| !p.precache.is_empty()) {
        let gateway = state.gateway.clone();
        background.spawn(async move {
            if let Some(fetcher) = gateway.partition(&partition.name) {
                fetcher.precache(partition.precache).await;
            }
        });
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(background))
        .await
        .context("serving HTTP")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown, aborts precache and revalidation tasks still in flight.
async fn shutdown_signal(background: BackgroundTasks) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    let pending = background.pending();
    background.abort_all();
    warn!(pending, "Background tasks aborted");
}
