//! Configuration for cache backends and the reference cache server.
//!
//! Backend settings are read from a [`ConfigSource`] under a section name.
//! With the default [`EnvSource`], a section maps to an environment variable
//! prefix: section `HTTP_CACHE` reads `HTTP_CACHE_SERVERS`,
//! `HTTP_CACHE_CACHE_TIMEOUT`, and so on.
//!
//! ## Remote HTTP cache (`HTTP_CACHE` by default)
//!
//! ```bash
//! export HTTP_CACHE_SERVERS="cache-a:8080;cache-b:8080"
//! export HTTP_CACHE_SCHEMA="http"            # default: http
//! export HTTP_CACHE_PREFIX_URL="rest/"       # default: rest/
//! export HTTP_CACHE_CACHE_TIMEOUT="1"        # seconds, default: 1
//! export HTTP_CACHE_AUTHENTICATION="user:pass"
//! ```
//!
//! ## Memcached (`MEMCACHED` by default)
//!
//! ```bash
//! export MEMCACHED_URL="tcp://localhost:11211"
//! export MEMCACHED_CACHE_TIMEOUT="1"
//! export MEMCACHED_TRACE_ENABLED="false"
//! ```
//!
//! ## Redis (`REDIS` by default)
//!
//! ```bash
//! export REDIS_URL="redis://localhost:6379/0"
//! export REDIS_DEFAULT_EXPIRATION_MINUTES="60"
//! ```
//!
//! ## Reference server
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:8080`)
//! - `CACHE_SERVER_PREFIX_URL` - Path prefix (default: `rest/`)
//! - `CACHE_SERVER_AUTHENTICATION` - Required `user:pass` credential (optional)
//! - `RUST_LOG` - Log level (default: `info`)
//! - `LOG_FORMAT` - `text` or `json` (default: `text`)

use crate::error::{CacheError, CacheResult};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_HTTP_SECTION: &str = "HTTP_CACHE";
pub const DEFAULT_MEMCACHED_SECTION: &str = "MEMCACHED";
pub const DEFAULT_REDIS_SECTION: &str = "REDIS";

/// When a backend re-reads its configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReloadPolicy {
    /// Read once at construction.
    #[default]
    OnceAtStartup,
    /// Re-read before every operation; meant for local debugging.
    OnEveryCall,
}

/// A flat key/value view of configuration.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// Fixed in-memory configuration, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapSource(HashMap<String, String>);

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

impl<S: ConfigSource + ?Sized> ConfigSource for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

fn section_key(section: &str, name: &str) -> String {
    format!("{}_{}", section, name)
}

/// Parses a section value, falling back to `default` when absent.
///
/// Present-but-unparsable values are configuration errors, never silently defaulted.
fn parse_or<T: FromStr>(
    source: &dyn ConfigSource,
    section: &str,
    name: &str,
    default: T,
) -> CacheResult<T> {
    let key = section_key(section, name);
    match source.get(&key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            CacheError::Configuration(format!("{} has an invalid value '{}'", key, raw))
        }),
    }
}

fn parse_bool_or(
    source: &dyn ConfigSource,
    section: &str,
    name: &str,
    default: bool,
) -> CacheResult<bool> {
    let key = section_key(section, name);
    match source.get(&key) {
        None => Ok(default),
        Some(raw) if raw.eq_ignore_ascii_case("true") || raw == "1" => Ok(true),
        Some(raw) if raw.eq_ignore_ascii_case("false") || raw == "0" => Ok(false),
        Some(raw) => Err(CacheError::Configuration(format!(
            "{} must be true or false, got '{}'",
            key, raw
        ))),
    }
}

/// Settings for [`crate::infrastructure::cache::RemoteHttpCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCacheSettings {
    pub prefix_url: String,
    pub cache_timeout: Duration,
    pub servers: Vec<Url>,
    /// Plaintext credential; base64-encoded when sent.
    pub authentication: String,
}

impl RemoteCacheSettings {
    /// Reads the section from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if `CACHE_TIMEOUT` is not a whole
    /// number of seconds or a server entry does not form a valid URL.
    pub fn load(source: &dyn ConfigSource, section: &str) -> CacheResult<Self> {
        let prefix_url = source
            .get(&section_key(section, "PREFIX_URL"))
            .unwrap_or_else(|| "rest/".to_string());
        let cache_timeout = Duration::from_secs(parse_or(source, section, "CACHE_TIMEOUT", 1u64)?);
        let schema = source
            .get(&section_key(section, "SCHEMA"))
            .unwrap_or_else(|| "http".to_string());
        let authentication = source
            .get(&section_key(section, "AUTHENTICATION"))
            .unwrap_or_default();

        let servers = source
            .get(&section_key(section, "SERVERS"))
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|server| {
                Url::parse(&format!("{}://{}", schema, server)).map_err(|e| {
                    CacheError::Configuration(format!("Invalid cache server '{}': {}", server, e))
                })
            })
            .collect::<CacheResult<Vec<_>>>()?;

        Ok(Self {
            prefix_url,
            cache_timeout,
            servers,
            authentication,
        })
    }
}

/// Settings for [`crate::infrastructure::cache::MemcachedCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemcachedSettings {
    pub url: String,
    pub cache_timeout: Duration,
    /// Wraps every operation in a named tracing span.
    pub trace_enabled: bool,
}

impl MemcachedSettings {
    pub fn load(source: &dyn ConfigSource, section: &str) -> CacheResult<Self> {
        Ok(Self {
            url: source
                .get(&section_key(section, "URL"))
                .unwrap_or_else(|| "tcp://localhost:11211".to_string()),
            cache_timeout: Duration::from_secs(parse_or(source, section, "CACHE_TIMEOUT", 1u64)?),
            trace_enabled: parse_bool_or(source, section, "TRACE_ENABLED", false)?,
        })
    }
}

/// Settings for [`crate::infrastructure::cache::RedisCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct RedisSettings {
    pub url: String,
    pub default_expiration: Duration,
}

impl RedisSettings {
    pub fn load(source: &dyn ConfigSource, section: &str) -> CacheResult<Self> {
        let url = source
            .get(&section_key(section, "URL"))
            .unwrap_or_else(|| "redis://localhost:6379/0".to_string());

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(CacheError::Configuration(format!(
                "{} must start with 'redis://' or 'rediss://', got '{}'",
                section_key(section, "URL"),
                url
            )));
        }

        let minutes = parse_or(source, section, "DEFAULT_EXPIRATION_MINUTES", 60u64)?;

        Ok(Self {
            url,
            default_expiration: Duration::from_secs(minutes * 60),
        })
    }
}

/// Configuration of the `cache-relay` reference server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub prefix_url: String,
    pub authentication: Option<String>,
    pub log_level: String,
    pub log_format: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let prefix_url =
            env::var("CACHE_SERVER_PREFIX_URL").unwrap_or_else(|_| "rest/".to_string());
        let authentication = env::var("CACHE_SERVER_AUTHENTICATION")
            .ok()
            .filter(|v| !v.is_empty());
        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        Ok(Self {
            listen_addr,
            prefix_url,
            authentication,
            log_level,
            log_format,
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_format` is not `text` or `json`
    /// - `listen_addr` is not `host:port`
    /// - `prefix_url` contains characters other than a path prefix
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        if self.prefix_url.contains(['?', '#']) {
            anyhow::bail!(
                "CACHE_SERVER_PREFIX_URL must be a plain path prefix, got '{}'",
                self.prefix_url
            );
        }

        Ok(())
    }

    /// Prints configuration summary (without sensitive data).
    pub fn print_summary(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen address: {}", self.listen_addr);
        tracing::info!("  Prefix: /{}", self.prefix_url.trim_start_matches('/'));
        tracing::info!(
            "  Authentication: {}",
            if self.authentication.is_some() {
                "required"
            } else {
                "disabled"
            }
        );
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
    }
}

/// Loads and validates the server configuration from environment variables.
///
/// Expects `.env` to be loaded already (e.g. via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> anyhow::Result<ServerConfig> {
    let config = ServerConfig::from_env()?;
    config.validate()?;
    Ok(config)
}

/// Masks the password in connection strings for logging.
///
/// `redis://:password@host:6379/0` becomes `redis://:***@host:6379/0`.
pub fn mask_connection_string(url: &str) -> String {
    if let Some(start) = url.find("://") {
        let scheme_end = start + 3;
        let rest = &url[scheme_end..];

        if let Some(at_pos) = rest.find('@') {
            let credentials = &rest[..at_pos];
            let host_part = &rest[at_pos..];

            if let Some(colon_pos) = credentials.rfind(':') {
                let username = &credentials[..colon_pos];
                return format!("{}://{}:***{}", &url[..start], username, host_part);
            }
        }
    }

    url.to_string()
}
