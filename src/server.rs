//! HTTP server initialization and runtime setup.
//!
//! Handles store setup, the expiry sweeper, and Axum server lifecycle.

use crate::config::ServerConfig;
use crate::infrastructure::memory_store::MemoryStore;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::Result;
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;

const PURGE_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically drops expired entries until `shutdown` fires.
pub async fn run_expiry_sweeper(store: Arc<MemoryStore>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = store.len(), "Expired entries purged");
                }
            }
        }
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

/// Runs the reference cache server with the given configuration.
///
/// Initializes:
/// - In-memory entry store
/// - Background expiry sweeper
/// - Axum HTTP server with graceful shutdown on Ctrl+C
///
/// # Errors
///
/// Returns an error if:
/// - The listen address is invalid
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: ServerConfig) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let shutdown = CancellationToken::new();

    tokio::spawn(run_expiry_sweeper(store.clone(), shutdown.clone()));
    tracing::info!("Expiry sweeper started");

    let state = AppState::new(store, config.authentication.clone());
    let app = NormalizePathLayer::trim_trailing_slash().layer(app_router(state, &config.prefix_url));

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}
