//! Memoization of whole operations by name and arguments.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use super::cache_manager::CacheManager;
use crate::domain::EntryOptions;
use serde::Serialize;
use serde::de::DeserializeOwned;

const DEFAULT_CACHE_ID: &str = "default";
const DEFAULT_EXPIRE_MINUTES: u64 = 5;

/// Caches the result of an operation keyed by its name, the resource it acts
/// on, and its arguments.
///
/// Entries live under `CachedOperation_{operation}_{resource}` with one
/// `{name}_{value}` composite fragment per argument. Results are written with
/// `performAsync` so the backend never delays the response.
///
/// # Example
///
/// ```no_run
/// # use cache_relay::application::{CacheManager, CachedOperation};
/// # async fn demo(cache: CacheManager) -> Result<(), std::io::Error> {
/// let cached = CachedOperation::new(cache).expire_minutes(10);
///
/// let names: Vec<String> = cached
///     .run("list", "customers", [("page", 2)], || async {
///         Ok::<_, std::io::Error>(vec!["ann".to_string()])
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CachedOperation {
    cache: CacheManager,
    cache_id: String,
    expire_minutes: u64,
    idle_minutes: u64,
}

impl CachedOperation {
    pub fn new(cache: CacheManager) -> Self {
        Self {
            cache,
            cache_id: DEFAULT_CACHE_ID.to_string(),
            expire_minutes: DEFAULT_EXPIRE_MINUTES,
            idle_minutes: 0,
        }
    }

    pub fn cache_id(mut self, cache_id: impl Into<String>) -> Self {
        self.cache_id = cache_id.into();
        self
    }

    /// Zero falls back to five minutes.
    pub fn expire_minutes(mut self, minutes: u64) -> Self {
        self.expire_minutes = minutes;
        self
    }

    /// Zero disables the idle timeout, as does a zero expire time.
    pub fn idle_minutes(mut self, minutes: u64) -> Self {
        self.idle_minutes = minutes;
        self
    }

    pub fn key(operation: &str, resource: &str) -> String {
        format!("CachedOperation_{}_{}", operation, resource)
    }

    /// Entry options for one invocation.
    pub fn options<I, K, V>(&self, arguments: I) -> EntryOptions
    where
        I: IntoIterator<Item = (K, V)>,
        K: Display,
        V: Display,
    {
        let minutes = if self.expire_minutes > 0 {
            self.expire_minutes
        } else {
            DEFAULT_EXPIRE_MINUTES
        };

        let mut opts = EntryOptions::new()
            .composite(
                arguments
                    .into_iter()
                    .map(|(name, value)| format!("{}_{}", name, value)),
            )
            .expire_in(Duration::from_secs(minutes * 60))
            .perform_async(true);

        if self.expire_minutes > 0 && self.idle_minutes > 0 {
            opts = opts.idle_for(Duration::from_secs(self.idle_minutes * 60));
        }

        opts
    }

    /// Returns the cached result of `operation` on `resource`, running
    /// `factory` only on a miss.
    pub async fn run<I, K, V, T, F, Fut, E>(
        &self,
        operation: &str,
        resource: &str,
        arguments: I,
        factory: F,
    ) -> Result<T, E>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Display,
        V: Display,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = Self::key(operation, resource);
        let opts = self.options(arguments);

        self.cache
            .get_or_put(&self.cache_id, Some(&key), factory, &opts)
            .await
    }
}
