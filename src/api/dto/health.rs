//! Health endpoint body.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: StoreStats,
}

/// Snapshot of the in-memory store, expired entries included until purged.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub namespaces: usize,
    pub entries: usize,
}
