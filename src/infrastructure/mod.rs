//! Infrastructure layer for external integrations.
//!
//! # Modules
//!
//! - [`cache`] - Cache backends (remote HTTP, Memcached, Redis and no-op)
//! - [`pool`] - Round-robin pool of remote cache endpoints
//! - [`memory_store`] - Entry store of the reference cache server

pub mod cache;
pub mod memory_store;
pub mod pool;

pub use pool::ServerPool;
