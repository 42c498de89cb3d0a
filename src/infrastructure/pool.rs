//! Round-robin pool of cache server endpoints.

use crate::error::{CacheError, CacheResult};
use parking_lot::Mutex;
use url::Url;

#[derive(Debug, Default)]
struct PoolState {
    endpoints: Vec<Url>,
    cursor: usize,
}

/// A set of backend endpoints handed out in round-robin order.
///
/// Duplicates are allowed and raise that endpoint's selection weight.
/// Reading the current endpoint and advancing the cursor happen under the
/// same lock, so concurrent callers never observe a skipped or repeated slot.
///
/// Each backend owns its own pool; there is no process-wide endpoint list.
#[derive(Debug, Default)]
pub struct ServerPool {
    state: Mutex<PoolState>,
}

impl ServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool with the given endpoints in insertion order.
    pub fn with_endpoints(endpoints: impl IntoIterator<Item = Url>) -> Self {
        Self {
            state: Mutex::new(PoolState {
                endpoints: endpoints.into_iter().collect(),
                cursor: 0,
            }),
        }
    }

    pub fn add(&self, endpoint: Url) {
        self.state.lock().endpoints.push(endpoint);
    }

    /// Removes the first occurrence of `endpoint`.
    ///
    /// Returns `false` when the endpoint was not in the pool.
    pub fn remove(&self, endpoint: &Url) -> bool {
        let mut state = self.state.lock();

        match state.endpoints.iter().position(|e| e == endpoint) {
            Some(index) => {
                state.endpoints.remove(index);
                if state.cursor >= state.endpoints.len() {
                    state.cursor = 0;
                }
                true
            }
            None => false,
        }
    }

    /// Swaps the whole endpoint set and rewinds the cursor.
    pub fn replace_all(&self, endpoints: impl IntoIterator<Item = Url>) {
        let mut state = self.state.lock();
        state.endpoints = endpoints.into_iter().collect();
        state.cursor = 0;
    }

    /// Returns the endpoint under the cursor and moves the cursor forward.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::EmptyServerPool`] when no endpoints are configured.
    /// This is a configuration error and is never retried.
    pub fn next(&self) -> CacheResult<Url> {
        let mut state = self.state.lock();
        let len = state.endpoints.len();

        if len == 0 {
            return Err(CacheError::EmptyServerPool);
        }

        let index = state.cursor % len;
        state.cursor = (index + 1) % len;

        Ok(state.endpoints[index].clone())
    }

    pub fn current_index(&self) -> usize {
        self.state.lock().cursor
    }

    /// Moves the cursor; any index outside `[0, len)` resets it to 0.
    pub fn set_current_index(&self, index: usize) {
        let mut state = self.state.lock();
        state.cursor = if index < state.endpoints.len() {
            index
        } else {
            0
        };
    }

    pub fn len(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().endpoints.is_empty()
    }

    /// Snapshot of the endpoints in insertion order.
    pub fn endpoints(&self) -> Vec<Url> {
        self.state.lock().endpoints.clone()
    }
}
