//! Utility functions shared by the cache backends.
//!
//! - [`key_codec`] - Cache key composition and hashing

pub mod key_codec;
