//! Services built on top of the cache backends.

pub mod cache_manager;
pub mod cached_operation;

pub use cache_manager::{CacheManager, spawn_and_forget};
pub use cached_operation::CachedOperation;
