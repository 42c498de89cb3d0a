use std::sync::Arc;

use crate::infrastructure::memory_store::MemoryStore;

/// Shared state of the reference cache server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    /// Required `user:password`, or `None` to accept every request.
    pub authentication: Option<Arc<str>>,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, authentication: Option<String>) -> Self {
        Self {
            store,
            authentication: authentication.map(Arc::from),
        }
    }
}
