//! Handler for health check endpoint.

use axum::{Json, extract::State};

use crate::api::dto::health::{HealthResponse, StoreStats};
use crate::state::AppState;

/// Reports liveness and store size.
///
/// # Endpoint
///
/// `GET /health` (never requires authentication)
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "store": { "namespaces": 2, "entries": 12 }
/// }
/// ```
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store: StoreStats {
            namespaces: state.store.namespace_count(),
            entries: state.store.len(),
        },
    })
}
