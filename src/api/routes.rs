//! Cache entry route configuration.
//!
//! Entry routes require Basic authentication via
//! [`crate::api::middleware::auth`] when the server has a credential set.

use crate::api::handlers::{
    clear_namespace_handler, delete_entry_handler, get_entry_handler, put_entry_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get},
};

/// Route base for `prefix`: `"rest/"` becomes `"/rest"`, `""` becomes `""`.
fn base_path(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Entry routes under `prefix`.
///
/// # Endpoints
///
/// - `GET    /{prefix}{id}/{key}` - Read an entry
/// - `PUT    /{prefix}{id}/{key}` - Write an entry
/// - `DELETE /{prefix}{id}/{key}` - Delete an entry
/// - `DELETE /{prefix}{id}`       - Delete a whole namespace
pub fn cache_routes(prefix: &str) -> Router<AppState> {
    let base = base_path(prefix);

    Router::new()
        .route(
            &format!("{}/{{id}}/{{key}}", base),
            get(get_entry_handler)
                .put(put_entry_handler)
                .delete(delete_entry_handler),
        )
        .route(&format!("{}/{{id}}", base), delete(clear_namespace_handler))
}
