//! Cache-aside operations on top of a [`CacheBackend`].

use std::future::Future;
use std::sync::Arc;

use crate::domain::{EntryOptions, WriteMode, payload};
use crate::error::{CacheError, CacheResult};
use crate::infrastructure::cache::{CacheBackend, NullCache};
use crate::telemetry::{CACHE_HITS, CACHE_MISSES, CACHE_WRITE_FAILURES, CACHE_WRITES};
use crate::utils::key_codec::CacheKey;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs a cache write in the background and only logs its outcome.
///
/// The returned handle may be dropped; the task keeps running.
pub fn spawn_and_forget<F>(label: &'static str, op: F) -> JoinHandle<()>
where
    F: Future<Output = CacheResult<bool>> + Send + 'static,
{
    tokio::spawn(async move {
        match op.await {
            Ok(true) => debug!(op = label, "Background cache write applied"),
            Ok(false) => debug!(op = label, "Background cache write not applied"),
            Err(e) => warn!(op = label, error = %e, "Background cache write failed"),
        }
    })
}

/// Front door to a cache backend.
///
/// Composes keys, encodes values and decides which failures degrade to a
/// miss:
///
/// - reads (`get`, `get_text`, `touch`) never fail; any problem is a miss
/// - awaited writes (`put`, `delete`) surface errors to the caller
/// - detached writes (`put_detached`, `delete_detached`) only log
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
}

impl CacheManager {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// A manager whose backend stores nothing.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullCache::new()))
    }

    /// Uses the backend if it connected, otherwise disables caching.
    ///
    /// ```no_run
    /// # use cache_relay::application::CacheManager;
    /// # use cache_relay::config::{DEFAULT_REDIS_SECTION, EnvSource, ReloadPolicy};
    /// # use cache_relay::infrastructure::cache::RedisCache;
    /// # use std::sync::Arc;
    /// # async fn demo() {
    /// let cache = CacheManager::connected_or_disabled(
    ///     RedisCache::from_source(Arc::new(EnvSource), DEFAULT_REDIS_SECTION, ReloadPolicy::OnceAtStartup)
    ///         .await,
    /// );
    /// # }
    /// ```
    pub fn connected_or_disabled<B>(backend: CacheResult<B>) -> Self
    where
        B: CacheBackend + 'static,
    {
        match backend {
            Ok(backend) => Self::new(Arc::new(backend)),
            Err(e) => {
                warn!(error = %e, "Cache backend unavailable, caching disabled");
                Self::disabled()
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    fn cache_key(key: Option<&str>, opts: &EntryOptions) -> CacheKey {
        CacheKey::new(key, opts.composite_key())
    }

    fn record_write(&self, result: &CacheResult<bool>) {
        let backend = self.backend.name();
        metrics::counter!(CACHE_WRITES, "backend" => backend).increment(1);
        if !matches!(result, Ok(true)) {
            metrics::counter!(CACHE_WRITE_FAILURES, "backend" => backend).increment(1);
        }
    }

    /// Refreshes the lifetime of an entry. Returns `false` on any failure.
    pub async fn touch(&self, id: &str, key: Option<&str>, opts: &EntryOptions) -> bool {
        if opts.is_cancelled() {
            return false;
        }

        let cache_key = Self::cache_key(key, opts);

        match self
            .backend
            .touch(id, &cache_key, opts.expiration(), opts.cancel_token())
            .await
        {
            Ok(touched) => touched,
            Err(e) => {
                debug!(namespace = id, error = %e, "Cache touch failed");
                false
            }
        }
    }

    /// Reads the raw payload of an entry.
    ///
    /// Absent entries, empty payloads, timeouts and transport errors are all
    /// reported as `None`.
    pub async fn get_text(&self, id: &str, key: Option<&str>, opts: &EntryOptions) -> Option<String> {
        let text = self.read(id, key, opts).await;
        self.record_read(text.is_some());
        text
    }

    async fn read(&self, id: &str, key: Option<&str>, opts: &EntryOptions) -> Option<String> {
        if opts.is_cancelled() {
            return None;
        }

        let cache_key = Self::cache_key(key, opts);

        let result = self
            .backend
            .fetch(id, &cache_key, opts.expiration(), opts.cancel_token())
            .await;

        match result {
            Ok(Some(text)) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                debug!(namespace = id, backend = self.backend.name(), error = %e, "[CACHEMISS] Read failed");
                None
            }
        }
    }

    fn record_read(&self, hit: bool) {
        let backend = self.backend.name();
        if hit {
            metrics::counter!(CACHE_HITS, "backend" => backend).increment(1);
        } else {
            metrics::counter!(CACHE_MISSES, "backend" => backend).increment(1);
        }
    }

    /// Reads and decodes an entry; undecodable payloads count as a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        id: &str,
        key: Option<&str>,
        opts: &EntryOptions,
    ) -> Option<T> {
        let decoded = match self.read(id, key, opts).await {
            Some(text) => payload::decode(&text)
                .inspect_err(|e| debug!(namespace = id, error = %e, "Cached value could not be decoded"))
                .ok(),
            None => None,
        };

        self.record_read(decoded.is_some());
        decoded
    }

    /// Stores a value and waits for the backend.
    ///
    /// Values that serialize to `null` are not stored and yield `Ok(false)`.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Cancelled`] if the options' token is already cancelled
    /// - [`CacheError::Serialization`] if the value cannot be encoded
    /// - any backend error
    pub async fn put<V: Serialize + ?Sized>(
        &self,
        id: &str,
        key: Option<&str>,
        value: &V,
        opts: &EntryOptions,
    ) -> CacheResult<bool> {
        if opts.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let Some(text) = payload::encode(value)? else {
            debug!(namespace = id, "Skipping cache write of null value");
            return Ok(false);
        };

        let cache_key = Self::cache_key(key, opts);

        let result = self
            .backend
            .store(
                id,
                &cache_key,
                text,
                opts.expiration(),
                opts.perform_async_flag(),
                opts.cancel_token(),
            )
            .await;

        self.record_write(&result);
        result
    }

    /// Encodes the value now and stores it in the background.
    ///
    /// # Errors
    ///
    /// Only encoding and cancellation are reported; the write itself is
    /// fire-and-forget. Unless the options choose otherwise the backend is
    /// told to apply it asynchronously too.
    pub fn put_detached<V: Serialize + ?Sized>(
        &self,
        id: &str,
        key: Option<&str>,
        value: &V,
        opts: &EntryOptions,
    ) -> CacheResult<()> {
        if opts.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let Some(text) = payload::encode(value)? else {
            return Ok(());
        };

        self.spawn_store(id, Self::cache_key(key, opts), text, opts);
        Ok(())
    }

    fn spawn_store(&self, id: &str, cache_key: CacheKey, text: String, opts: &EntryOptions) {
        let manager = self.clone();
        let id = id.to_string();
        let expiration = *opts.expiration();
        let perform_async = opts.perform_async_flag().or(Some(true));
        let cancel = opts.cancel_token().clone();

        spawn_and_forget("put", async move {
            let result = manager
                .backend
                .store(&id, &cache_key, text, &expiration, perform_async, &cancel)
                .await;
            manager.record_write(&result);
            result
        });
    }

    /// Deletes an entry, or the whole namespace when neither a key nor
    /// composite fragments are given.
    pub async fn delete(&self, id: &str, key: Option<&str>, opts: &EntryOptions) -> CacheResult<bool> {
        if opts.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let cache_key = Self::cache_key(key, opts);

        self.backend
            .remove(id, &cache_key, opts.perform_async_flag(), opts.cancel_token())
            .await
    }

    /// Background variant of [`CacheManager::delete`].
    pub fn delete_detached(&self, id: &str, key: Option<&str>, opts: &EntryOptions) {
        if opts.is_cancelled() {
            return;
        }

        let backend = Arc::clone(&self.backend);
        let id = id.to_string();
        let cache_key = Self::cache_key(key, opts);
        let perform_async = opts.perform_async_flag().or(Some(true));
        let cancel = opts.cancel_token().clone();

        spawn_and_forget("delete", async move {
            backend.remove(&id, &cache_key, perform_async, &cancel).await
        });
    }

    /// Returns the cached value, or computes, stores and returns it.
    ///
    /// The factory runs at most once and only on a miss. Its error is returned
    /// unchanged and nothing is stored. A computed value is stored according
    /// to [`EntryOptions::write_mode`]; a failing store never hides the value.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use cache_relay::application::CacheManager;
    /// # use cache_relay::domain::EntryOptions;
    /// # async fn demo(cache: CacheManager) -> Result<(), std::io::Error> {
    /// let opts = EntryOptions::new().composite(["eu"]);
    /// let total: u64 = cache
    ///     .get_or_put("orders", Some("total"), || async { Ok::<_, std::io::Error>(42) }, &opts)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_or_put<T, F, Fut, E>(
        &self,
        id: &str,
        key: Option<&str>,
        factory: F,
        opts: &EntryOptions,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(id, key, opts).await {
            return Ok(cached);
        }

        let value = factory().await?;

        match opts.write_mode() {
            WriteMode::Detached => {
                if let Err(e) = self.put_detached(id, key, &value, opts) {
                    warn!(namespace = id, error = %e, "Failed to schedule cache write");
                }
            }
            WriteMode::Awaited { .. } => match self.put(id, key, &value, opts).await {
                Ok(true) => {}
                Ok(false) => debug!(namespace = id, "Cache write not applied"),
                Err(e) => warn!(namespace = id, error = %e, "Failed to cache computed value"),
            },
        }

        Ok(value)
    }
}
