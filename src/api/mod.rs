//! REST layer of the reference cache server.
//!
//! Speaks the same protocol [`crate::infrastructure::cache::RemoteHttpCache`]
//! uses, so the client can be run and tested against a real endpoint.
//!
//! # Modules
//!
//! - [`dto`] - Response bodies
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - Authentication middleware
//! - [`routes`] - Route configuration and composition

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
