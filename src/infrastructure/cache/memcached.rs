//! Memcached-backed cache implementation.

use super::guard::{bounded, cancellable};
use super::service::CacheBackend;
use crate::config::{ConfigSource, MemcachedSettings, mask_connection_string};
use crate::domain::{DEFAULT_TTL, Expiration};
use crate::error::{CacheError, CacheResult};
use crate::utils::key_codec::{CacheKey, hash};
use async_memcached::{AsciiProtocol, Client, MetaProtocol, Status};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span};

/// Longest exptime memcached reads as relative seconds; larger values are
/// unix timestamps.
const MAX_RELATIVE_EXPTIME: u64 = 30 * 24 * 60 * 60;

/// Memcached rejects longer keys.
const MAX_KEY_LENGTH: usize = 250;

/// Memcached cache backend.
///
/// Memcached has no notion of idle time, so an entry lives for
/// `expire_time`, else `idle_time`, else one hour. Entries are stored under
/// `{id}:{key}`, with the id hashed when that would exceed the key limit. A
/// namespace-wide delete is not possible and reports `false`.
pub struct MemcachedCache {
    client: Arc<Mutex<Client>>,
    settings: MemcachedSettings,
}

impl std::fmt::Debug for MemcachedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcachedCache")
            .field("client", &"Client")
            .field("settings", &self.settings)
            .finish()
    }
}

impl Clone for MemcachedCache {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            settings: self.settings.clone(),
        }
    }
}

/// Raw bytes of a memcached value as UTF-8 text.
fn value_text(data: impl Into<Option<Vec<u8>>>) -> CacheResult<String> {
    let bytes = data.into().unwrap_or_default();
    String::from_utf8(bytes)
        .map_err(|e| CacheError::Backend(format!("Invalid UTF-8 data: {}", e)))
}

/// Exptime for `expiration` as memcached reads it.
fn exptime(expiration: &Expiration) -> i64 {
    exptime_at(expiration, SystemTime::now())
}

fn exptime_at(expiration: &Expiration, now: SystemTime) -> i64 {
    let ttl = expiration.effective_ttl(DEFAULT_TTL).as_secs().max(1);

    if ttl <= MAX_RELATIVE_EXPTIME {
        return ttl as i64;
    }

    let since_epoch = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    since_epoch.saturating_add(ttl) as i64
}

/// `{id}:{key}`, with the id hashed when the plain form is too long.
fn storage_key(id: &str, key: &CacheKey) -> String {
    let plain = key.namespaced(id);
    if plain.len() <= MAX_KEY_LENGTH {
        return plain;
    }
    format!("{}:{}", hash(id), key.lookup())
}

impl MemcachedCache {
    /// Reads `section` from `source` and connects.
    pub async fn from_source(source: &dyn ConfigSource, section: &str) -> CacheResult<Self> {
        let settings = MemcachedSettings::load(source, section)?;
        Self::connect(settings).await
    }

    /// Connects to memcached, retrying a few times with backoff.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if every attempt fails.
    pub async fn connect(settings: MemcachedSettings) -> CacheResult<Self> {
        let masked = mask_connection_string(&settings.url);
        info!("Connecting to Memcached at {}", masked);

        let strategy = ExponentialBackoff::from_millis(50).map(jitter).take(3);
        let client = Retry::spawn(strategy, || Client::new(settings.url.as_str()))
            .await
            .map_err(|e| {
                CacheError::Connection(format!("Failed to connect to memcached: {}", e))
            })?;

        info!("✓ Connected to Memcached");

        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            settings,
        })
    }

    /// Span for one operation, or a disabled span when tracing is off.
    fn span(&self, op: &'static str, key: &str) -> Span {
        if self.settings.trace_enabled {
            info_span!("memcached", op, key)
        } else {
            Span::none()
        }
    }

    async fn traced<T, F>(&self, op: &'static str, key: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        fut.instrument(self.span(op, key)).await
    }

    async fn read(&self, key: &str) -> CacheResult<Option<String>> {
        let mut client = self.client.lock().await;

        let result = client
            .get(key)
            .await
            .map_err(|e| CacheError::Backend(format!("Memcached GET failed: {}", e)))?;

        result.map(|value| value_text(value.data)).transpose()
    }

    async fn write(&self, key: &str, payload: &str, ttl: i64) -> CacheResult<()> {
        let mut client = self.client.lock().await;

        client
            .set(key, payload.as_bytes(), Some(ttl), None)
            .await
            .map_err(|e| CacheError::Backend(format!("Memcached SET failed: {}", e)))
    }
}

#[async_trait]
impl CacheBackend for MemcachedCache {
    fn name(&self) -> &'static str {
        "memcached"
    }

    async fn fetch(
        &self,
        id: &str,
        key: &CacheKey,
        _expiration: &Expiration,
        cancel: &CancellationToken,
    ) -> CacheResult<Option<String>> {
        let storage_key = storage_key(id, key);

        let result = self
            .traced(
                "get",
                &storage_key,
                bounded(self.settings.cache_timeout, cancel, self.read(&storage_key)),
            )
            .await?;

        match &result {
            Some(_) => debug!(namespace = id, "[CACHEHIT] (memcached)"),
            None => debug!(namespace = id, "[CACHEMISS] Miss (memcached)"),
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
        let storage_key = storage_key(id, key);
        let ttl = exptime(expiration);

        self.traced(
            "set",
            &storage_key,
            cancellable(cancel, self.write(&storage_key, &payload, ttl)),
        )
        .await?;

        debug!(namespace = id, exptime = ttl, "Cache SET (memcached)");
        Ok(true)
    }

    async fn remove(
        &self,
        id: &str,
        key: &CacheKey,
        _perform_async: Option<bool>,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        if key.is_keyless() {
            debug!(
                namespace = id,
                "Namespace deletion not supported for Memcached, relying on TTL expiry"
            );
            return Ok(false);
        }

        let storage_key = storage_key(id, key);

        let removed = self
            .traced("delete", &storage_key, cancellable(cancel, async {
                let mut client = self.client.lock().await;

                match client.delete(&storage_key).await {
                    Ok(()) => Ok(true),
                    Err(async_memcached::Error::Protocol(Status::NotFound)) => Ok(false),
                    Err(e) => Err(CacheError::Backend(format!("Memcached DELETE failed: {}", e))),
                }
            }))
            .await?;

        debug!(namespace = id, removed, "Cache DEL (memcached)");
        Ok(removed)
    }

    async fn touch(
        &self,
        id: &str,
        key: &CacheKey,
        expiration: &Expiration,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        let storage_key = storage_key(id, key);
        let ttl = exptime(expiration);

        self.traced(
            "touch",
            &storage_key,
            bounded(self.settings.cache_timeout, cancel, async {
                let mut client = self.client.lock().await;
                let ttl_flag = format!("T{}", ttl);
                // `s` asks for the size back so a hit is never an empty reply
                let flags = ["s", ttl_flag.as_str()];

                let touched = client
                    .meta_get(&storage_key, false, None, Some(&flags[..]))
                    .await
                    .map_err(|e| CacheError::Backend(format!("Memcached TOUCH failed: {}", e)))?;

                Ok::<_, CacheError>(touched.is_some())
            }),
        )
        .await
    }

    async fn health_check(&self) -> bool {
        let mut client = self.client.lock().await;

        match client.version().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Memcached health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_value_text_accepts_optional_bytes() {
        assert_eq!(value_text(b"abc".to_vec()).unwrap(), "abc");
        assert_eq!(value_text(None::<Vec<u8>>).unwrap(), "");
        assert!(value_text(vec![0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_ttl_collapses_expiration() {
        assert_eq!(exptime(&Expiration::default()), 3600);
        assert_eq!(
            exptime(&Expiration::new(None, Some(Duration::from_secs(90)))),
            90
        );
        assert_eq!(
            exptime(&Expiration::new(
                Some(Duration::from_secs(30)),
                Some(Duration::from_secs(90))
            )),
            30
        );
        assert_eq!(
            exptime(&Expiration::new(Some(Duration::from_millis(200)), None)),
            1
        );
    }

    #[test]
    fn test_ttl_over_thirty_days_becomes_absolute() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let thirty_days = Duration::from_secs(MAX_RELATIVE_EXPTIME);
        let month = Duration::from_secs(31 * 86_400);

        assert_eq!(
            exptime_at(&Expiration::new(Some(thirty_days), None), now),
            2_592_000
        );
        assert_eq!(
            exptime_at(&Expiration::new(Some(month), None), now),
            1_700_000_000 + 2_678_400
        );
        assert_eq!(
            exptime_at(&Expiration::new(None, Some(month)), now),
            1_700_000_000 + 2_678_400
        );
    }

    #[test]
    fn test_storage_key_fits_memcached_limit() {
        let key = CacheKey::new(Some("k"), &["eu"]);

        assert_eq!(storage_key("orders", &key), format!("orders:{}", key.lookup()));

        let long_id = "n".repeat(300);
        let long = storage_key(&long_id, &key);
        assert!(long.len() <= MAX_KEY_LENGTH);
        assert_eq!(long, format!("{}:{}", hash(&long_id), key.lookup()));
        assert_ne!(storage_key(&"m".repeat(300), &key), long);
    }

    #[cfg(feature = "test-services")]
    mod integration {
        use super::*;
        use crate::config::{DEFAULT_MEMCACHED_SECTION, EnvSource};
        use tracing::warn;

        const NONE: &[&str] = &[];

        async fn connect() -> Option<MemcachedCache> {
            match MemcachedCache::from_source(&EnvSource, DEFAULT_MEMCACHED_SECTION).await {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!("Skipping Memcached test (not available): {}", e);
                    None
                }
            }
        }

        fn unique(prefix: &str) -> String {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos();
            format!("{}-{}", prefix, nanos)
        }

        #[tokio::test]
        async fn test_memcached_crud_operations() {
            let Some(cache) = connect().await else { return };
            let token = CancellationToken::new();
            let id = unique("crud");
            let key = CacheKey::new(Some("k"), NONE);
            let exp = Expiration::new(Some(Duration::from_secs(60)), None);

            assert!(cache
                .store(&id, &key, "value".into(), &exp, None, &token)
                .await
                .unwrap());
            assert_eq!(
                cache.fetch(&id, &key, &exp, &token).await.unwrap(),
                Some("value".to_string())
            );
            assert!(cache.touch(&id, &key, &exp, &token).await.unwrap());
            assert!(cache.remove(&id, &key, None, &token).await.unwrap());
            assert!(!cache.remove(&id, &key, None, &token).await.unwrap());
            assert_eq!(cache.fetch(&id, &key, &exp, &token).await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_memcached_touch_keeps_latest_value() {
            let Some(cache) = connect().await else { return };
            let token = CancellationToken::new();
            let id = unique("touch");
            let key = CacheKey::new(Some("k"), NONE);
            let exp = Expiration::new(Some(Duration::from_secs(60)), None);

            assert!(!cache.touch(&id, &key, &exp, &token).await.unwrap());

            cache.store(&id, &key, "v1".into(), &exp, None, &token).await.unwrap();
            let (touched, stored) = tokio::join!(
                cache.touch(&id, &key, &exp, &token),
                cache.store(&id, &key, "v2".into(), &exp, None, &token),
            );
            assert!(touched.unwrap());
            assert!(stored.unwrap());

            assert_eq!(
                cache.fetch(&id, &key, &exp, &token).await.unwrap(),
                Some("v2".to_string())
            );
        }

        #[tokio::test]
        async fn test_memcached_remove_missing_key_is_false() {
            let Some(cache) = connect().await else { return };
            let key = CacheKey::new(Some("never-stored"), NONE);

            let removed = cache
                .remove(&unique("missing"), &key, None, &CancellationToken::new())
                .await
                .unwrap();

            assert!(!removed);
        }

        #[tokio::test]
        async fn test_memcached_long_namespace() {
            let Some(cache) = connect().await else { return };
            let token = CancellationToken::new();
            let id = format!("{}-{}", unique("long"), "x".repeat(300));
            let key = CacheKey::new(Some("k"), NONE);
            let exp = Expiration::new(Some(Duration::from_secs(60)), None);

            assert!(cache.store(&id, &key, "v".into(), &exp, None, &token).await.unwrap());
            assert_eq!(
                cache.fetch(&id, &key, &exp, &token).await.unwrap(),
                Some("v".to_string())
            );
        }

        #[tokio::test]
        async fn test_memcached_keyless_remove_is_noop() {
            let Some(cache) = connect().await else { return };
            let key = CacheKey::new(None, NONE);

            let removed = cache
                .remove(&unique("ns"), &key, None, &CancellationToken::new())
                .await
                .unwrap();

            assert!(!removed);
        }

        #[tokio::test]
        async fn test_memcached_health_check() {
            let Some(cache) = connect().await else { return };
            assert!(cache.health_check().await);
        }
    }
}
