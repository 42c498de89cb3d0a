//! Conversion between caller values and the opaque text stored in the cache.
//!
//! Strings are stored verbatim; every other value is stored as compact JSON.
//! The decision is made by what the value serializes to, not by its Rust type,
//! so a newtype that serializes as a string is also stored verbatim.

use crate::error::CacheResult;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Encodes a value for storage.
///
/// Returns `Ok(None)` for values that serialize to `null` (e.g. `None`);
/// there is nothing to store for them.
///
/// # Errors
///
/// Returns [`crate::error::CacheError::Serialization`] if the value cannot be
/// serialized.
pub fn encode<V: Serialize + ?Sized>(value: &V) -> CacheResult<Option<String>> {
    match serde_json::to_value(value)? {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        other => Ok(Some(serde_json::to_string(&other)?)),
    }
}

/// Decodes a stored payload into `T`.
///
/// Payloads are parsed as JSON first. If that fails the raw text is offered to
/// `T` as a JSON string, which is how verbatim-stored strings come back.
///
/// # Errors
///
/// Returns [`crate::error::CacheError::Serialization`] when neither reading fits `T`.
pub fn decode<T: DeserializeOwned>(payload: &str) -> CacheResult<T> {
    match serde_json::from_str(payload) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_json::from_value(Value::String(payload.to_string()))
            .map_err(|_| json_err.into()),
    }
}
