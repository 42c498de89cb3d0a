//! Remote REST cache accessed over HTTP.
//!
//! Each entry lives at `{endpoint}/{prefix}{id}/{hashed_key}` on one of the
//! pooled cache servers:
//!
//! | Operation | Verb     | Notes                                         |
//! |-----------|----------|-----------------------------------------------|
//! | fetch     | `GET`    | 2xx body is the value, anything else a miss   |
//! | store     | `PUT`    | `text/plain` body                             |
//! | remove    | `DELETE` | no key segment clears the namespace           |
//! | touch     | `GET`    | server refreshes the entry as a side effect   |
//!
//! Lifetimes travel in the `timeToLiveSeconds` and `maxIdleTimeSeconds`
//! headers; `performAsync` lets the server apply a write without blocking.

use super::guard::{bounded, cancellable};
use super::service::CacheBackend;
use crate::config::{ConfigSource, ReloadPolicy, RemoteCacheSettings};
use crate::domain::{DEFAULT_TTL, Expiration, format_seconds};
use crate::error::{CacheError, CacheResult};
use crate::infrastructure::pool::ServerPool;
use crate::utils::key_codec::{CacheKey, urlfy};
use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::RwLock;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

pub const HEADER_TIME_TO_LIVE: &str = "timeToLiveSeconds";
pub const HEADER_MAX_IDLE_TIME: &str = "maxIdleTimeSeconds";
pub const HEADER_PERFORM_ASYNC: &str = "performAsync";

const TEXT_PLAIN: &str = "text/plain";

/// Lifetime and write-mode headers for a request.
///
/// At least one lifetime header is always present: `timeToLiveSeconds`
/// falls back to one hour when neither time is given.
pub fn request_headers(
    expiration: &Expiration,
    perform_async: Option<bool>,
) -> Vec<(&'static str, String)> {
    let mut headers = Vec::with_capacity(3);

    if let Some(idle) = expiration.idle_time {
        headers.push((HEADER_MAX_IDLE_TIME, format_seconds(idle)));
    }

    match expiration.expire_time {
        Some(ttl) => headers.push((HEADER_TIME_TO_LIVE, format_seconds(ttl))),
        None if expiration.idle_time.is_none() => {
            headers.push((HEADER_TIME_TO_LIVE, format_seconds(DEFAULT_TTL)))
        }
        None => {}
    }

    if let Some(perform_async) = perform_async {
        headers.push((HEADER_PERFORM_ASYNC, perform_async.to_string()));
    }

    headers
}

/// Where settings come from and how often they are re-read.
struct SettingsSource {
    source: Arc<dyn ConfigSource>,
    section: String,
    policy: ReloadPolicy,
}

/// Cache backend talking to a pool of remote REST cache servers.
///
/// Endpoints come from the `SERVERS` setting and can be adjusted at runtime
/// with [`RemoteHttpCache::add_server`] / [`RemoteHttpCache::remove_server`].
/// With [`ReloadPolicy::OnEveryCall`] the settings are re-read before every
/// operation and a changed server list replaces the pool (runtime additions
/// included).
pub struct RemoteHttpCache {
    client: Client,
    settings: RwLock<RemoteCacheSettings>,
    source: Option<SettingsSource>,
    pool: ServerPool,
}

impl RemoteHttpCache {
    /// Reads `section` from `source` and builds the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if the section is invalid, or
    /// [`CacheError::Connection`] if the HTTP client cannot be built.
    pub fn from_source(
        source: Arc<dyn ConfigSource>,
        section: impl Into<String>,
        policy: ReloadPolicy,
    ) -> CacheResult<Self> {
        let section = section.into();
        let settings = RemoteCacheSettings::load(source.as_ref(), &section)?;

        let mut cache = Self::from_settings(settings)?;
        cache.source = Some(SettingsSource {
            source,
            section,
            policy,
        });

        Ok(cache)
    }

    /// Builds the backend from fixed settings, read once.
    pub fn from_settings(settings: RemoteCacheSettings) -> CacheResult<Self> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(2))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CacheError::Connection(format!("Failed to create HTTP client: {}", e))
            })?;

        let pool = ServerPool::with_endpoints(settings.servers.iter().cloned());

        debug!(
            servers = pool.len(),
            prefix = %settings.prefix_url,
            timeout_secs = settings.cache_timeout.as_secs(),
            "Remote HTTP cache configured"
        );

        Ok(Self {
            client,
            settings: RwLock::new(settings),
            source: None,
            pool,
        })
    }

    pub fn add_server(&self, endpoint: Url) {
        self.pool.add(endpoint);
    }

    pub fn remove_server(&self, endpoint: &Url) -> bool {
        self.pool.remove(endpoint)
    }

    pub fn pool(&self) -> &ServerPool {
        &self.pool
    }

    /// Current settings, re-read first under [`ReloadPolicy::OnEveryCall`].
    fn settings(&self) -> CacheResult<RemoteCacheSettings> {
        if let Some(src) = &self.source
            && src.policy == ReloadPolicy::OnEveryCall
        {
            let fresh = RemoteCacheSettings::load(src.source.as_ref(), &src.section)?;

            if self.pool.endpoints() != fresh.servers {
                self.pool.replace_all(fresh.servers.iter().cloned());
            }

            *self.settings.write() = fresh;
        }

        Ok(self.settings.read().clone())
    }

    /// Builds the absolute URL for `{prefix}{id}{tail}` on the next endpoint.
    fn resource_url(
        &self,
        settings: &RemoteCacheSettings,
        id: &str,
        tail: &str,
    ) -> CacheResult<Url> {
        let endpoint = self.pool.next()?;
        let resource = format!("{}{}{}", settings.prefix_url, urlfy(id), tail);

        endpoint.join(&resource).map_err(|e| {
            CacheError::Configuration(format!("Invalid cache resource '{}': {}", resource, e))
        })
    }

    fn entry_url(&self, settings: &RemoteCacheSettings, id: &str, key: &CacheKey) -> CacheResult<Url> {
        self.resource_url(settings, id, &format!("/{}", key.lookup()))
    }

    fn delete_url(&self, settings: &RemoteCacheSettings, id: &str, key: &CacheKey) -> CacheResult<Url> {
        if key.is_keyless() {
            self.resource_url(settings, id, "")
        } else {
            self.resource_url(settings, id, &format!("/{}", key.delete()))
        }
    }

    /// Starts a request carrying the default and per-call headers.
    fn request(
        &self,
        method: Method,
        url: Url,
        settings: &RemoteCacheSettings,
        headers: Vec<(&'static str, String)>,
    ) -> RequestBuilder {
        let credential = base64::engine::general_purpose::STANDARD.encode(&settings.authentication);

        trace!(
            %method,
            %url,
            headers = %headers
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(", "),
            "Remote cache request"
        );

        headers.into_iter().fold(
            self.client
                .request(method, url)
                .header("Accept", TEXT_PLAIN)
                .header("Authorization", format!("Basic {}", credential)),
            |req, (name, value)| req.header(name, value),
        )
    }
}

#[async_trait]
impl CacheBackend for RemoteHttpCache {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(
        &self,
        id: &str,
        key: &CacheKey,
        expiration: &Expiration,
        cancel: &CancellationToken,
    ) -> CacheResult<Option<String>> {
        let settings = self.settings()?;
        let url = self.entry_url(&settings, id, key)?;
        let request = self.request(Method::GET, url, &settings, request_headers(expiration, None));

        bounded(settings.cache_timeout, cancel, async {
            let response = request.send().await?;

            if !response.status().is_success() {
                debug!(namespace = id, status = %response.status(), "[CACHEMISS] Miss (http)");
                return Ok(None);
            }

            let body = response.text().await?;
            debug!(namespace = id, "[CACHEHIT] (http)");
            Ok::<_, CacheError>(Some(body))
        })
        .await
    }

    async fn store(
        &self,
        id: &str,
        key: &CacheKey,
        payload: String,
        expiration: &Expiration,
        perform_async: Option<bool>,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        let settings = self.settings()?;
        let url = self.entry_url(&settings, id, key)?;
        let request = self
            .request(
                Method::PUT,
                url,
                &settings,
                request_headers(expiration, perform_async),
            )
            .header("Content-Type", format!("{}; charset=utf-8", TEXT_PLAIN))
            .body(payload);

        cancellable(cancel, async {
            let response = request.send().await?;
            debug!(namespace = id, status = %response.status(), "Cache PUT (http)");
            Ok::<_, CacheError>(response.status().is_success())
        })
        .await
    }

    async fn remove(
        &self,
        id: &str,
        key: &CacheKey,
        perform_async: Option<bool>,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        let settings = self.settings()?;
        let url = self.delete_url(&settings, id, key)?;

        let mut headers = Vec::with_capacity(1);
        if let Some(perform_async) = perform_async {
            headers.push((HEADER_PERFORM_ASYNC, perform_async.to_string()));
        }

        let request = self.request(Method::DELETE, url, &settings, headers);

        cancellable(cancel, async {
            let response = request.send().await?;
            debug!(namespace = id, keyless = key.is_keyless(), status = %response.status(), "Cache DEL (http)");
            Ok::<_, CacheError>(response.status().is_success())
        })
        .await
    }

    async fn touch(
        &self,
        id: &str,
        key: &CacheKey,
        expiration: &Expiration,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        let settings = self.settings()?;
        let url = self.entry_url(&settings, id, key)?;
        let request = self.request(Method::GET, url, &settings, request_headers(expiration, None));

        bounded(settings.cache_timeout, cancel, async {
            let response = request.send().await?;
            Ok::<_, CacheError>(response.status().is_success())
        })
        .await
    }

    async fn health_check(&self) -> bool {
        let Ok(settings) = self.settings() else {
            return false;
        };
        let Ok(url) = self.resource_url(&settings, "", "") else {
            return false;
        };

        let request = self.request(Method::GET, url, &settings, Vec::new());
        matches!(
            tokio::time::timeout(settings.cache_timeout, request.send()).await,
            Ok(Ok(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapSource;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const NONE: &[&str] = &[];

    fn settings(servers: &[&str]) -> RemoteCacheSettings {
        RemoteCacheSettings {
            prefix_url: "rest/".to_string(),
            cache_timeout: Duration::from_secs(1),
            servers: servers.iter().map(|s| Url::parse(s).unwrap()).collect(),
            authentication: "user:pass".to_string(),
        }
    }

    fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_headers_default_ttl_when_unset() {
        let headers = request_headers(&Expiration::default(), None);

        assert_eq!(header(&headers, HEADER_TIME_TO_LIVE), Some("3600"));
        assert_eq!(header(&headers, HEADER_MAX_IDLE_TIME), None);
        assert_eq!(header(&headers, HEADER_PERFORM_ASYNC), None);
    }

    #[test]
    fn test_headers_idle_only_suppresses_default_ttl() {
        let exp = Expiration::new(None, Some(Duration::from_secs(120)));
        let headers = request_headers(&exp, None);

        assert_eq!(header(&headers, HEADER_MAX_IDLE_TIME), Some("120"));
        assert_eq!(header(&headers, HEADER_TIME_TO_LIVE), None);
    }

    #[test]
    fn test_headers_both_times_and_async() {
        let exp = Expiration::new(
            Some(Duration::from_millis(1500)),
            Some(Duration::from_secs(60)),
        );
        let headers = request_headers(&exp, Some(true));

        assert_eq!(header(&headers, HEADER_TIME_TO_LIVE), Some("1.5"));
        assert_eq!(header(&headers, HEADER_MAX_IDLE_TIME), Some("60"));
        assert_eq!(header(&headers, HEADER_PERFORM_ASYNC), Some("true"));
    }

    #[test]
    fn test_entry_url_layout() {
        let cache = RemoteHttpCache::from_settings(settings(&["http://a:1"])).unwrap();
        let key = CacheKey::new(Some("user42"), &["profile"]);

        let url = cache
            .entry_url(&cache.settings().unwrap(), "orders/eu", &key)
            .unwrap();

        assert_eq!(
            url.as_str(),
            format!("http://a:1/rest/orders%2Feu/{}", key.lookup())
        );
    }

    #[test]
    fn test_keyless_delete_targets_namespace() {
        let cache = RemoteHttpCache::from_settings(settings(&["http://a:1"])).unwrap();
        let key = CacheKey::new(None, NONE);

        let url = cache
            .delete_url(&cache.settings().unwrap(), "orders", &key)
            .unwrap();

        assert_eq!(url.as_str(), "http://a:1/rest/orders");
    }

    #[test]
    fn test_urls_rotate_through_pool() {
        let cache =
            RemoteHttpCache::from_settings(settings(&["http://a:1", "http://b:1"])).unwrap();
        let key = CacheKey::new(Some("k"), NONE);
        let s = cache.settings().unwrap();

        let first = cache.entry_url(&s, "ns", &key).unwrap();
        let second = cache.entry_url(&s, "ns", &key).unwrap();

        assert_eq!(first.host_str(), Some("a"));
        assert_eq!(second.host_str(), Some("b"));
    }

    #[tokio::test]
    async fn test_empty_pool_fails_request() {
        let cache = RemoteHttpCache::from_settings(settings(&[])).unwrap();
        let key = CacheKey::new(Some("k"), NONE);

        let result = cache
            .fetch("ns", &key, &Expiration::default(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(CacheError::EmptyServerPool)));
    }

    #[tokio::test]
    async fn test_cancelled_fetch_does_not_send() {
        let cache = RemoteHttpCache::from_settings(settings(&["http://127.0.0.1:9"])).unwrap();
        let key = CacheKey::new(Some("k"), NONE);
        let token = CancellationToken::new();
        token.cancel();

        let result = cache
            .fetch("ns", &key, &Expiration::default(), &token)
            .await;

        assert!(matches!(result, Err(CacheError::Cancelled)));
    }

    #[test]
    fn test_runtime_server_management() {
        let cache = RemoteHttpCache::from_settings(settings(&["http://a:1"])).unwrap();

        cache.add_server(Url::parse("http://b:1").unwrap());
        assert_eq!(cache.pool().len(), 2);

        assert!(cache.remove_server(&Url::parse("http://a:1").unwrap()));
        assert_eq!(cache.pool().endpoints()[0].host_str(), Some("b"));
    }

    /// Configuration whose values can change between calls.
    #[derive(Default)]
    struct MutableSource(Mutex<HashMap<String, String>>);

    impl MutableSource {
        fn set(&self, key: &str, value: &str) {
            self.0.lock().insert(key.to_string(), value.to_string());
        }
    }

    impl ConfigSource for MutableSource {
        fn get(&self, key: &str) -> Option<String> {
            self.0.lock().get(key).cloned()
        }
    }

    #[test]
    fn test_reload_on_every_call_picks_up_changes() {
        let source = Arc::new(MutableSource::default());
        source.set("HTTP_CACHE_SERVERS", "a:1");

        let cache =
            RemoteHttpCache::from_source(source.clone(), "HTTP_CACHE", ReloadPolicy::OnEveryCall)
                .unwrap();

        source.set("HTTP_CACHE_SERVERS", "b:1;c:1");
        source.set("HTTP_CACHE_PREFIX_URL", "v2/");

        let s = cache.settings().unwrap();

        assert_eq!(s.prefix_url, "v2/");
        assert_eq!(cache.pool().len(), 2);
        assert_eq!(cache.pool().endpoints()[0].host_str(), Some("b"));
    }

    #[test]
    fn test_reload_keeps_rotation_when_servers_unchanged() {
        let source = Arc::new(MutableSource::default());
        source.set("HTTP_CACHE_SERVERS", "a:1;b:1");

        let cache =
            RemoteHttpCache::from_source(source, "HTTP_CACHE", ReloadPolicy::OnEveryCall).unwrap();
        let key = CacheKey::new(Some("k"), NONE);

        let first = cache.entry_url(&cache.settings().unwrap(), "ns", &key).unwrap();
        let second = cache.entry_url(&cache.settings().unwrap(), "ns", &key).unwrap();

        assert_ne!(first.host_str(), second.host_str());
    }

    #[test]
    fn test_once_at_startup_ignores_later_changes() {
        let source = Arc::new(MutableSource::default());
        source.set("HTTP_CACHE_SERVERS", "a:1");

        let cache = RemoteHttpCache::from_source(
            source.clone(),
            "HTTP_CACHE",
            ReloadPolicy::OnceAtStartup,
        )
        .unwrap();

        source.set("HTTP_CACHE_SERVERS", "b:1");

        cache.settings().unwrap();
        assert_eq!(cache.pool().endpoints()[0].host_str(), Some("a"));
    }

    #[test]
    fn test_from_source_rejects_bad_timeout() {
        let source = Arc::new(MapSource::new().with("HTTP_CACHE_CACHE_TIMEOUT", "x"));

        let result = RemoteHttpCache::from_source(source, "HTTP_CACHE", ReloadPolicy::OnceAtStartup);

        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }
}
