//! Cache backends.
//!
//! Provides a [`CacheBackend`] trait with four implementations:
//! - [`RemoteHttpCache`] - Remote REST cache servers behind a round-robin pool
//! - [`MemcachedCache`] - Memcached
//! - [`RedisCache`] - Redis, also usable directly with plain string keys
//! - [`NullCache`] - No-op implementation for testing/disabled caching

mod guard;
mod memcached;
mod null_cache;
mod redis_cache;
pub mod remote_http;
mod service;

pub use memcached::MemcachedCache;
pub use null_cache::NullCache;
pub use redis_cache::RedisCache;
pub use remote_http::RemoteHttpCache;
pub use service::CacheBackend;

#[cfg(test)]
pub use service::MockCacheBackend;
