//! Core cache types shared by every backend.
//!
//! - [`expiration`] - Expire/idle time resolution
//! - [`options`] - Per-call options and write modes
//! - [`payload`] - Value encoding for storage

pub mod expiration;
pub mod options;
pub mod payload;

pub use expiration::{DEFAULT_TTL, Expiration, format_seconds, parse_seconds};
pub use options::{EntryOptions, WriteMode};
