//! No-op cache implementation for testing or disabled caching.

use super::service::CacheBackend;
use crate::domain::Expiration;
use crate::error::CacheResult;
use crate::utils::key_codec::CacheKey;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A cache backend that stores nothing.
///
/// Every read misses and every write reports `false` without failing, so
/// `get_or_put` always runs its factory.
///
/// # Use Cases
///
/// - Development environments without a cache server
/// - Testing scenarios where caching should be bypassed
/// - Fallback when a backend fails to connect at startup
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        debug!("Using NullCache (caching disabled)");
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn fetch(
        &self,
        _id: &str,
        _key: &CacheKey,
        _expiration: &Expiration,
        _cancel: &CancellationToken,
    ) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn store(
        &self,
        _id: &str,
        _key: &CacheKey,
        _payload: String,
        _expiration: &Expiration,
        _perform_async: Option<bool>,
        _cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        Ok(false)
    }

    async fn remove(
        &self,
        _id: &str,
        _key: &CacheKey,
        _perform_async: Option<bool>,
        _cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        Ok(false)
    }

    async fn touch(
        &self,
        _id: &str,
        _key: &CacheKey,
        _expiration: &Expiration,
        _cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        Ok(false)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
