//! # cache-relay
//!
//! A cache-aside client over interchangeable distributed caches, plus a small
//! reference server for the remote HTTP cache protocol.
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Expiration, per-call options, value encoding
//! - **Application Layer** ([`application`]) - [`CacheManager`] and [`CachedOperation`]
//! - **Infrastructure Layer** ([`infrastructure`]) - Cache backends and the server pool
//! - **API Layer** ([`api`]) - REST handlers of the reference server
//!
//! ## Backends
//!
//! - Remote REST cache servers over HTTP, round-robin across endpoints
//! - Memcached
//! - Redis
//!
//! ## Quick Start
//!
//! ```no_run
//! use cache_relay::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = RemoteHttpCache::from_source(
//!     Arc::new(EnvSource),
//!     "HTTP_CACHE",
//!     ReloadPolicy::OnceAtStartup,
//! )?;
//! let cache = CacheManager::new(Arc::new(backend));
//!
//! let opts = EntryOptions::new().composite(["eu"]);
//! let total: u64 = cache
//!     .get_or_put("orders", Some("total"), || async { Ok::<_, std::io::Error>(42) }, &opts)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Backends read section-scoped settings through [`config::ConfigSource`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;
pub mod telemetry;

pub mod routes;

pub use application::{CacheManager, CachedOperation};
pub use error::{CacheError, CacheResult};
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::{CacheManager, CachedOperation};
    pub use crate::config::{ConfigSource, EnvSource, MapSource, ReloadPolicy};
    pub use crate::domain::{EntryOptions, Expiration, WriteMode};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::infrastructure::cache::{
        CacheBackend, MemcachedCache, NullCache, RedisCache, RemoteHttpCache,
    };
}
