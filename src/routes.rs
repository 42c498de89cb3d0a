//! Top-level router of the reference cache server.
//!
//! # Route Structure
//!
//! - `GET  /health`                - Health check (public)
//! - `/{prefix}{id}[/{key}]`       - Cache entries (Basic auth when configured)
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Authentication** - Basic credential on entry routes

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::auth;
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Constructs the application router with all routes and middleware.
///
/// # Arguments
///
/// - `state` - shared server state injected into all handlers
/// - `prefix` - path prefix of entry routes, e.g. `rest/`
pub fn app_router(state: AppState, prefix: &str) -> Router {
    let entries = api::routes::cache_routes(prefix).route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::layer,
    ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(entries)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::DEBUG)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
}
