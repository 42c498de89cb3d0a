//! Basic authentication middleware.

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBasic;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{error::ServerError, state::AppState};

/// Compares digests in constant time so neither the length nor the first
/// differing byte of the credential shows in the response time.
fn credentials_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented.as_slice().ct_eq(expected.as_slice()).into()
}

/// Checks the `Authorization: Basic` credential against the configured one.
///
/// # Header Format
///
/// ```text
/// Authorization: Basic base64(user:password)
/// ```
///
/// Passes every request through when the server has no credential
/// configured.
///
/// # Errors
///
/// Returns `401 Unauthorized` if:
/// - Authorization header is missing or not Basic
/// - The credential does not match
///
/// Adds `WWW-Authenticate: Basic` header to 401 responses.
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, routing::get, middleware};
/// use crate::api::middleware::auth;
///
/// let protected = Router::new()
///     .route("/rest/{id}/{key}", get(get_entry_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth::layer));
/// ```
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(expected) = st.authentication.as_deref() else {
        return Ok(next.run(req).await);
    };

    let (mut parts, body) = req.into_parts();

    let AuthBasic((user, password)) = AuthBasic::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            ServerError::unauthorized(
                "Unauthorized",
                serde_json::json!({"reason": "Authorization header is missing or invalid"}),
            )
        })?;

    let presented = format!("{}:{}", user, password.unwrap_or_default());
    if !credentials_match(&presented, expected) {
        return Err(ServerError::unauthorized(
            "Unauthorized",
            serde_json::json!({"reason": "Invalid credentials"}),
        ));
    }

    let req = Request::from_parts(parts, body);

    Ok(next.run(req).await)
}
