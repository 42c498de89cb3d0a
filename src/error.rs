//! Error types for cache operations and the reference cache server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors that can occur during cache operations.
///
/// Read paths never surface these to callers: [`crate::application::CacheManager`]
/// converts every variant into a miss. Awaited writes return them unchanged.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Missing or unparsable configuration value
    #[error("Cache configuration error: {0}")]
    Configuration(String),

    /// A request was routed through a pool with no endpoints
    #[error("Server pool is empty")]
    EmptyServerPool,

    /// Failed to connect to the cache backend
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Network-level failure talking to the backend
    #[error("Cache transport error: {0}")]
    Transport(String),

    /// The backend did not answer within the configured cache timeout
    #[error("Cache operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Failed to serialize or deserialize a cache payload
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// The backend answered but reported a failure
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// The caller cancelled the operation before it started
    #[error("Cache operation cancelled")]
    Cancelled,
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connection(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() {
            Self::Connection(e.to_string())
        } else {
            Self::Backend(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
    details: Value,
}

/// Errors returned by the reference cache server handlers.
#[derive(Debug)]
pub enum ServerError {
    Validation { message: String, details: Value },
    Unauthorized { message: String, details: Value },
    NotFound { message: String, details: Value },
}

impl ServerError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn unauthorized(message: impl Into<String>, details: Value) -> Self {
        Self::Unauthorized {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ServerError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                details,
            ),
            ServerError::Unauthorized { message, details } => {
                let body = ErrorBody {
                    error: ErrorInfo {
                        code: "unauthorized",
                        message,
                        details,
                    },
                };
                return (
                    StatusCode::UNAUTHORIZED,
                    [("WWW-Authenticate", "Basic")],
                    Json(body),
                )
                    .into_response();
            }
            ServerError::NotFound { message, details } => {
                (StatusCode::NOT_FOUND, "not_found", message, details)
            }
        };

        let body = ErrorBody {
            error: ErrorInfo {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Builds a 404 for an absent or expired entry.
pub fn entry_not_found(namespace: &str, key: &str) -> ServerError {
    ServerError::not_found(
        "Entry not found",
        json!({ "namespace": namespace, "key": key }),
    )
}
