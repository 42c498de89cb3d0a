//! Logging setup and metric names.

use tracing_subscriber::EnvFilter;

/// Counter: reads answered from the cache.
pub const CACHE_HITS: &str = "cache_hits_total";
/// Counter: reads that fell through (absent, timeout, transport or decode failure).
pub const CACHE_MISSES: &str = "cache_misses_total";
/// Counter: writes issued to a backend.
pub const CACHE_WRITES: &str = "cache_writes_total";
/// Counter: writes that failed or were rejected.
pub const CACHE_WRITE_FAILURES: &str = "cache_write_failures_total";

/// Installs the global tracing subscriber.
///
/// `log_level` seeds the filter when `RUST_LOG` is not set; `log_format`
/// selects between human-readable (`text`) and structured (`json`) output.
pub fn init(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
