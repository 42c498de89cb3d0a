//! HTTP request handlers for API endpoints.

pub mod entries;
pub mod health;

pub use entries::{
    clear_namespace_handler, delete_entry_handler, get_entry_handler, put_entry_handler,
};
pub use health::health_handler;
