//! Handlers for cache entry endpoints.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

use crate::domain::{format_seconds, parse_seconds};
use crate::error::{ServerError, entry_not_found};
use crate::infrastructure::cache::remote_http::{
    HEADER_MAX_IDLE_TIME, HEADER_PERFORM_ASYNC, HEADER_TIME_TO_LIVE,
};
use crate::infrastructure::memory_store::Lifetime;
use crate::state::AppState;

/// Reads an optional seconds header; absent means no limit.
fn seconds_header(
    headers: &HeaderMap,
    name: &'static str,
) -> Result<Option<std::time::Duration>, ServerError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(parse_seconds)
        .ok_or_else(|| {
            ServerError::bad_request(
                "Invalid lifetime header",
                json!({ "header": name, "value": String::from_utf8_lossy(value.as_bytes()) }),
            )
        })
}

/// Extracts the entry lifetime from `timeToLiveSeconds` / `maxIdleTimeSeconds`.
pub fn lifetime_from_headers(headers: &HeaderMap) -> Result<Lifetime, ServerError> {
    Ok(Lifetime {
        time_to_live: seconds_header(headers, HEADER_TIME_TO_LIVE)?,
        max_idle: seconds_header(headers, HEADER_MAX_IDLE_TIME)?,
    })
}

fn has_lifetime_headers(headers: &HeaderMap) -> bool {
    headers.contains_key(HEADER_TIME_TO_LIVE) || headers.contains_key(HEADER_MAX_IDLE_TIME)
}

fn perform_async(headers: &HeaderMap) -> bool {
    headers
        .get(HEADER_PERFORM_ASYNC)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Returns the stored value of an entry.
///
/// # Endpoint
///
/// `GET /{prefix}{id}/{key}`
///
/// Reading an entry restarts its idle timer. When the request carries
/// `timeToLiveSeconds` or `maxIdleTimeSeconds`, the entry takes that lifetime
/// and its absolute limit restarts from now. The response carries the entry's
/// lifetime headers as they now stand.
///
/// # Errors
///
/// Returns `400 Bad Request` if a lifetime header is not a number.
/// Returns `404 Not Found` if the entry is absent or expired.
pub async fn get_entry_handler(
    State(state): State<AppState>,
    Path((id, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let renew = has_lifetime_headers(&headers);
    let entry = if renew {
        let lifetime = lifetime_from_headers(&headers)?;
        state.store.get_renewed(&id, &key, lifetime)
    } else {
        state.store.get(&id, &key)
    };
    let (value, lifetime) = entry.ok_or_else(|| entry_not_found(&id, &key))?;

    debug!(namespace = %id, key = %key, renewed = renew, "Entry read");

    let mut response = value.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    for (name, limit) in [
        (HEADER_TIME_TO_LIVE, lifetime.time_to_live),
        (HEADER_MAX_IDLE_TIME, lifetime.max_idle),
    ] {
        if let Some(limit) = limit
            && let Ok(name) = HeaderName::from_bytes(name.as_bytes())
            && let Ok(value) = HeaderValue::from_str(&format_seconds(limit))
        {
            headers.insert(name, value);
        }
    }

    Ok(response)
}

/// Stores the request body as the entry value.
///
/// # Endpoint
///
/// `PUT /{prefix}{id}/{key}`
///
/// # Headers
///
/// - `timeToLiveSeconds` - absolute lifetime (optional, `<= 0` means none)
/// - `maxIdleTimeSeconds` - sliding lifetime (optional, `<= 0` means none)
/// - `performAsync` - accepted; writes are applied immediately either way
///
/// # Errors
///
/// Returns `400 Bad Request` if a lifetime header is not a number.
pub async fn put_entry_handler(
    State(state): State<AppState>,
    Path((id, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ServerError> {
    let lifetime = lifetime_from_headers(&headers)?;

    debug!(
        namespace = %id,
        key = %key,
        ttl = ?lifetime.time_to_live,
        max_idle = ?lifetime.max_idle,
        perform_async = perform_async(&headers),
        "Entry written"
    );

    state.store.put(&id, &key, body, lifetime);
    Ok(StatusCode::NO_CONTENT)
}

/// Deletes one entry.
///
/// # Endpoint
///
/// `DELETE /{prefix}{id}/{key}`
///
/// # Errors
///
/// Returns `404 Not Found` if the entry is absent.
pub async fn delete_entry_handler(
    State(state): State<AppState>,
    Path((id, key)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    if !state.store.remove(&id, &key) {
        return Err(entry_not_found(&id, &key));
    }

    debug!(namespace = %id, key = %key, "Entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Deletes every entry of a namespace.
///
/// # Endpoint
///
/// `DELETE /{prefix}{id}`
///
/// # Errors
///
/// Returns `404 Not Found` if the namespace holds no entries.
pub async fn clear_namespace_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    if !state.store.clear(&id) {
        return Err(ServerError::not_found(
            "Namespace not found",
            json!({ "namespace": id }),
        ));
    }

    debug!(namespace = %id, "Namespace cleared");
    Ok(StatusCode::NO_CONTENT)
}
