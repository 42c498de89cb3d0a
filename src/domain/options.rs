//! Per-call options for cache operations.

use super::expiration::Expiration;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a write triggered by the cache layer is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Spawned in the background; the caller gets no confirmation.
    Detached,
    /// Awaited; `perform_async` is forwarded to backends that can defer the
    /// write on their side (the remote HTTP cache).
    Awaited { perform_async: bool },
}

/// Optional arguments shared by every cache operation.
///
/// # Example
///
/// ```
/// use cache_relay::domain::EntryOptions;
/// use std::time::Duration;
///
/// let opts = EntryOptions::new()
///     .composite(["profile", "v2"])
///     .expire_in(Duration::from_secs(300))
///     .perform_async(true);
///
/// assert_eq!(opts.composite_key(), ["profile", "v2"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntryOptions {
    composite_key: Vec<String>,
    expiration: Expiration,
    perform_async: Option<bool>,
    cancel: CancellationToken,
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends composite-key fragments, in order.
    pub fn composite<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.composite_key
            .extend(fragments.into_iter().map(Into::into));
        self
    }

    pub fn expire_in(mut self, ttl: Duration) -> Self {
        self.expiration.expire_time = Some(ttl);
        self
    }

    pub fn idle_for(mut self, idle: Duration) -> Self {
        self.expiration.idle_time = Some(idle);
        self
    }

    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Requests an awaited write, telling the backend whether it may apply it
    /// asynchronously on its side.
    pub fn perform_async(mut self, perform_async: bool) -> Self {
        self.perform_async = Some(perform_async);
        self
    }

    /// Ties the operation to a cancellation token.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn composite_key(&self) -> &[String] {
        &self.composite_key
    }

    pub fn expiration(&self) -> &Expiration {
        &self.expiration
    }

    pub fn perform_async_flag(&self) -> Option<bool> {
        self.perform_async
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Write mode used by `get_or_put` when it stores a freshly computed value.
    pub fn write_mode(&self) -> WriteMode {
        match self.perform_async {
            None => WriteMode::Detached,
            Some(perform_async) => WriteMode::Awaited { perform_async },
        }
    }
}
