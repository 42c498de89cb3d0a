//! HTTP middleware for request processing and protection.

pub mod auth;
