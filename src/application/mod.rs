//! Application layer: the cache-aside API callers use.
//!
//! # Available Services
//!
//! - [`services::cache_manager::CacheManager`] - Typed get/put/delete/touch and `get_or_put`
//! - [`services::cached_operation::CachedOperation`] - Memoizes whole operations by name and arguments

pub mod services;

pub use services::{CacheManager, CachedOperation, spawn_and_forget};
