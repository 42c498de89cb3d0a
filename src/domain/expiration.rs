//! Expiration resolution shared by every backend.

use std::time::Duration;

/// TTL applied when neither an expire time nor an idle time is given.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Requested lifetime of a cache entry.
///
/// Backends that only understand a single TTL collapse both values through
/// [`Expiration::effective_ttl`]: the expire time wins, the idle time is the
/// fallback, and the backend default applies when both are absent. The remote
/// HTTP protocol forwards both values separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expiration {
    pub expire_time: Option<Duration>,
    pub idle_time: Option<Duration>,
}

impl Expiration {
    pub fn new(expire_time: Option<Duration>, idle_time: Option<Duration>) -> Self {
        Self {
            expire_time,
            idle_time,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.expire_time.is_none() && self.idle_time.is_none()
    }

    /// Single TTL used by backends without separate idle tracking.
    pub fn effective_ttl(&self, default: Duration) -> Duration {
        self.expire_time.or(self.idle_time).unwrap_or(default)
    }
}

/// Renders a duration as protocol seconds: `3600`, `1.5`.
pub fn format_seconds(duration: Duration) -> String {
    format!("{}", duration.as_secs_f64())
}

/// Parses protocol seconds. Zero or negative values mean "no limit".
///
/// Returns `None` for text that is not a finite number.
pub fn parse_seconds(raw: &str) -> Option<Option<Duration>> {
    let seconds: f64 = raw.trim().parse().ok()?;

    if !seconds.is_finite() {
        return None;
    }

    if seconds <= 0.0 {
        return Some(None);
    }

    Some(Some(Duration::from_secs_f64(seconds)))
}
