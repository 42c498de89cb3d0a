//! Redis-backed cache implementation.

use super::guard::cancellable;
use super::service::CacheBackend;
use crate::config::{ConfigSource, RedisSettings, ReloadPolicy, mask_connection_string};
use crate::domain::{Expiration, payload};
use crate::error::{CacheError, CacheResult};
use crate::utils::key_codec::{CacheKey, urlfy};
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Redis cache.
///
/// Offers a direct key/value API ([`RedisCache::get`], [`RedisCache::put`],
/// [`RedisCache::get_or_put`], ...) for plain string keys and also
/// implements [`CacheBackend`] so it can sit behind a
/// [`crate::application::CacheManager`]. Uses connection pooling via
/// `ConnectionManager`.
pub struct RedisCache {
    client: ConnectionManager,
    default_expiration: RwLock<Duration>,
    source: Option<(Arc<dyn ConfigSource>, String, ReloadPolicy)>,
}

impl RedisCache {
    /// Reads `section` from `source` and connects.
    ///
    /// With [`ReloadPolicy::OnEveryCall`] the default expiration is re-read
    /// before each operation. The connection URL is fixed at startup.
    pub async fn from_source(
        source: Arc<dyn ConfigSource>,
        section: impl Into<String>,
        policy: ReloadPolicy,
    ) -> CacheResult<Self> {
        let section = section.into();
        let settings = RedisSettings::load(source.as_ref(), &section)?;

        let mut cache = Self::connect(&settings).await?;
        cache.source = Some((source, section, policy));

        Ok(cache)
    }

    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the URL is invalid, the connection cannot
    /// be established after a few attempts, or the PING health check fails.
    pub async fn connect(settings: &RedisSettings) -> CacheResult<Self> {
        info!("Connecting to Redis at {}", mask_connection_string(&settings.url));

        let client = Client::open(settings.url.as_str()).map_err(|e| {
            CacheError::Connection(format!("Failed to create Redis client: {}", e))
        })?;

        let strategy = ExponentialBackoff::from_millis(50).map(jitter).take(3);
        let manager = Retry::spawn(strategy, || ConnectionManager::new(client.clone()))
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::Connection(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis");

        Ok(Self {
            client: manager,
            default_expiration: RwLock::new(settings.default_expiration),
            source: None,
        })
    }

    /// Lifetime used when a call does not give one.
    fn default_expiration(&self) -> Duration {
        if let Some((source, section, ReloadPolicy::OnEveryCall)) = &self.source {
            match RedisSettings::load(source.as_ref(), section) {
                Ok(fresh) => *self.default_expiration.write() = fresh.default_expiration,
                Err(e) => warn!(error = %e, "Keeping previous Redis settings"),
            }
        }

        *self.default_expiration.read()
    }

    /// Idle time has no Redis equivalent; it only stands in for a missing expire time.
    fn backend_ttl(&self, expiration: &Expiration) -> u64 {
        expiration
            .effective_ttl(self.default_expiration())
            .as_secs()
            .max(1)
    }

    fn ttl_seconds(&self, expire: Option<Duration>) -> u64 {
        expire
            .unwrap_or_else(|| self.default_expiration())
            .as_secs()
            .max(1)
    }

    async fn set_text(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
        replace_existing: bool,
    ) -> CacheResult<bool> {
        let mut conn = self.client.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(ttl_seconds);
        if !replace_existing {
            cmd.arg("NX");
        }

        // NX yields nil when the key already exists
        let reply: Option<String> = cmd.query_async(&mut conn).await?;

        debug!(key, ttl_seconds, written = reply.is_some(), "Cache SET");
        Ok(reply.is_some())
    }

    async fn get_text(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.client.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> CacheResult<bool> {
        let mut conn = self.client.clone();
        let updated: bool = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(updated)
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.client.clone();
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    /// Resets the lifetime of `key` to `expire`, or the default expiration.
    ///
    /// Returns `false` when the key does not exist or Redis is unreachable.
    pub async fn touch(&self, key: &str, expire: Option<Duration>) -> bool {
        match self.expire(key, self.ttl_seconds(expire)).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!("Redis EXPIRE error for {}: {}", key, e);
                false
            }
        }
    }

    /// Reads and decodes `key`.
    ///
    /// Absent keys, Redis errors and undecodable values all come back as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get_text(key).await {
            Ok(Some(text)) if !text.is_empty() => match payload::decode(&text) {
                Ok(value) => {
                    debug!("Cache HIT: {}", key);
                    Some(value)
                }
                Err(e) => {
                    debug!("Cache value for {} could not be decoded: {}", key, e);
                    None
                }
            },
            Ok(_) => {
                debug!("Cache MISS: {}", key);
                None
            }
            Err(e) => {
                warn!("Redis GET error for {}: {}", key, e);
                None
            }
        }
    }

    /// Stores `value` under `key`.
    ///
    /// With `replace_existing == false` an existing value is kept and the call
    /// returns `Ok(false)`. Null values are not stored.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expire: Option<Duration>,
        replace_existing: bool,
    ) -> CacheResult<bool> {
        let Some(text) = payload::encode(value)? else {
            return Ok(false);
        };

        self.set_text(key, &text, self.ttl_seconds(expire), replace_existing)
            .await
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// Factory errors propagate unchanged; a failed store is logged and the
    /// computed value is still returned.
    pub async fn get_or_put<T, F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        expire: Option<Duration>,
        replace_existing: bool,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = factory().await?;

        if let Err(e) = self.put(key, &value, expire, replace_existing).await {
            warn!("Redis SET error for {}: {}", key, e);
        }

        Ok(value)
    }

    /// Deletes `key`, reporting whether it existed.
    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        let deleted = self.del(key).await?;
        if deleted {
            debug!("Cache INVALIDATE: {}", key);
        }
        Ok(deleted)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn fetch(
        &self,
        id: &str,
        key: &CacheKey,
        _expiration: &Expiration,
        cancel: &CancellationToken,
    ) -> CacheResult<Option<String>> {
        let storage_key = key.namespaced(id);
        let result = cancellable(cancel, self.get_text(&storage_key)).await?;

        match &result {
            Some(_) => debug!(namespace = id, "[CACHEHIT] (redis)"),
            None => debug!(namespace = id, "[CACHEMISS] Miss (redis)"),
        }

        Ok(result)
    }

    async fn store(
        &self,
        id: &str,
        key: &CacheKey,
        payload: String,
        expiration: &Expiration,
        _perform_async: Option<bool>,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        let storage_key = key.namespaced(id);
        let ttl = self.backend_ttl(expiration);

        cancellable(cancel, self.set_text(&storage_key, &payload, ttl, true)).await
    }

    async fn remove(
        &self,
        id: &str,
        key: &CacheKey,
        _perform_async: Option<bool>,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        if key.is_keyless() {
            return cancellable(cancel, self.remove_namespace(id)).await;
        }

        cancellable(cancel, self.del(&key.namespaced(id))).await
    }

    async fn touch(
        &self,
        id: &str,
        key: &CacheKey,
        expiration: &Expiration,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        let ttl = self.backend_ttl(expiration);
        cancellable(cancel, self.expire(&key.namespaced(id), ttl)).await
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}

impl RedisCache {
    /// Deletes every key under namespace `id` using SCAN, never KEYS.
    async fn remove_namespace(&self, id: &str) -> CacheResult<bool> {
        let mut conn = self.client.clone();
        let pattern = namespace_pattern(id);

        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: u64 = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                deleted += removed;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(namespace = id, deleted, "Cache namespace DEL (redis)");
        Ok(deleted > 0)
    }
}

/// SCAN pattern matching every key stored under namespace `id`.
///
/// Percent-encoding leaves no glob metacharacters in the namespace.
fn namespace_pattern(id: &str) -> String {
    format!("{}:*", urlfy(id))
}
