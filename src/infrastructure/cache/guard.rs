//! Deadline and cancellation wrappers for backend round-trips.

use crate::error::{CacheError, CacheResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs `op` until it completes, `limit` elapses, or `cancel` fires.
///
/// Elapsed deadlines surface as [`CacheError::Timeout`] so the caller can
/// treat them as a miss.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    cancel: &CancellationToken,
    op: F,
) -> CacheResult<T>
where
    F: Future<Output = CacheResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(CacheError::Cancelled);
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(CacheError::Cancelled),
        result = tokio::time::timeout(limit, op) => {
            result.map_err(|_| CacheError::Timeout(limit))?
        }
    }
}

/// Runs `op` until it completes or `cancel` fires.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, op: F) -> CacheResult<T>
where
    F: Future<Output = CacheResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(CacheError::Cancelled);
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(CacheError::Cancelled),
        result = op => result,
    }
}
