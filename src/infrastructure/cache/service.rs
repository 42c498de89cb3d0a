//! Cache backend trait.

use crate::domain::Expiration;
use crate::error::CacheResult;
use crate::utils::key_codec::CacheKey;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Network operations every cache backend provides.
///
/// Backends speak in already-composed keys and opaque text payloads; key
/// hashing, value encoding and the cache-aside flow live in
/// [`crate::application::CacheManager`], which is what callers use.
///
/// Implementations return errors as they happen (timeouts included). The
/// manager decides which of them degrade to a miss.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RemoteHttpCache`] - REST cache over HTTP
/// - [`crate::infrastructure::cache::MemcachedCache`] - Memcached
/// - [`crate::infrastructure::cache::RedisCache`] - Redis
/// - [`crate::infrastructure::cache::NullCache`] - No-op implementation for disabled caching
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Reads the payload stored under `(id, key)`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(payload))` on hit
    /// - `Ok(None)` when the entry is absent
    async fn fetch(
        &self,
        id: &str,
        key: &CacheKey,
        expiration: &Expiration,
        cancel: &CancellationToken,
    ) -> CacheResult<Option<String>>;

    /// Stores `payload` under `(id, key)`, replacing any previous value.
    ///
    /// `perform_async` is forwarded to backends that can apply writes
    /// asynchronously on their side and ignored by the others.
    async fn store(
        &self,
        id: &str,
        key: &CacheKey,
        payload: String,
        expiration: &Expiration,
        perform_async: Option<bool>,
        cancel: &CancellationToken,
    ) -> CacheResult<bool>;

    /// Removes `(id, key)`; a keyless key addresses the whole namespace where
    /// the backend supports it.
    async fn remove(
        &self,
        id: &str,
        key: &CacheKey,
        perform_async: Option<bool>,
        cancel: &CancellationToken,
    ) -> CacheResult<bool>;

    /// Extends the lifetime of an existing entry without changing its value.
    ///
    /// Returns `Ok(false)` when the entry does not exist.
    async fn touch(
        &self,
        id: &str,
        key: &CacheKey,
        expiration: &Expiration,
        cancel: &CancellationToken,
    ) -> CacheResult<bool>;

    /// Checks if the backend is reachable.
    async fn health_check(&self) -> bool;
}
