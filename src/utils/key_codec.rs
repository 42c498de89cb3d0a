//! Cache key composition and hashing.
//!
//! A logical key plus its composite fragments collapse into a single opaque,
//! fixed-width identifier that is safe to place in a request path or to use
//! as a backend lookup key.

use sha2::{Digest, Sha256};
use std::borrow::Cow;

/// Returned by [`generate_key`] when neither a key nor composite fragments are given.
///
/// Callers treat it as "logically keyless", e.g. an entity-level entry.
pub const NO_KEY_DEFINED: &str = "no-key-defined";

/// Separator between the primary key and each composite fragment.
const FRAGMENT_SEPARATOR: &str = "_";

/// Percent-encodes a fragment for use as a single path segment.
pub fn urlfy(fragment: &str) -> Cow<'_, str> {
    urlencoding::encode(fragment)
}

/// Hashes a fragment into a URL-safe 64-character hex string.
///
/// SHA-256 over the UTF-8 bytes, rendered as lowercase hex. Hex output never
/// needs escaping, but it still goes through [`urlfy`] so the result is a
/// valid path segment by construction.
pub fn hash(fragment: &str) -> String {
    let digest = Sha256::digest(fragment.as_bytes());
    urlfy(&hex::encode(digest)).into_owned()
}

/// Concatenates the key with its composite fragments.
fn full_key<S: AsRef<str>>(key: Option<&str>, composite_key: &[S]) -> String {
    let mut full = key.unwrap_or_default().to_string();

    for fragment in composite_key {
        full.push_str(FRAGMENT_SEPARATOR);
        full.push_str(fragment.as_ref());
    }

    full
}

/// Builds the lookup key for `(key, composite_key)`.
///
/// Returns [`NO_KEY_DEFINED`] (unhashed) when the concatenation is empty,
/// otherwise the [`hash`] of `key_fragment1_fragment2...`.
///
/// Hashing is purely string-based: `("a_b", [])` and `("a", ["b"])` produce
/// the same key.
///
/// # Examples
///
/// ```
/// use cache_relay::utils::key_codec::{generate_key, NO_KEY_DEFINED};
///
/// assert_eq!(generate_key::<&str>(None, &[]), NO_KEY_DEFINED);
/// assert_eq!(generate_key(Some("user42"), &["profile"]).len(), 64);
/// ```
pub fn generate_key<S: AsRef<str>>(key: Option<&str>, composite_key: &[S]) -> String {
    let full = full_key(key, composite_key);

    if full.is_empty() {
        return NO_KEY_DEFINED.to_string();
    }

    hash(&full)
}

/// Like [`generate_key`], but keyless input yields an empty string.
///
/// Delete requests omit the key segment entirely in that case instead of
/// sending the sentinel, which turns them into namespace-wide deletes.
pub fn generate_delete_key<S: AsRef<str>>(key: Option<&str>, composite_key: &[S]) -> String {
    let generated = generate_key(key, composite_key);

    if generated == NO_KEY_DEFINED {
        String::new()
    } else {
        generated
    }
}

/// The codec output for a single call, computed once and shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    lookup: String,
    delete: String,
}

impl CacheKey {
    pub fn new<S: AsRef<str>>(key: Option<&str>, composite_key: &[S]) -> Self {
        let lookup = generate_key(key, composite_key);
        let delete = if lookup == NO_KEY_DEFINED {
            String::new()
        } else {
            lookup.clone()
        };

        Self { lookup, delete }
    }

    /// Key used for get, put and touch.
    pub fn lookup(&self) -> &str {
        &self.lookup
    }

    /// Key used for delete; empty when keyless.
    pub fn delete(&self) -> &str {
        &self.delete
    }

    pub fn is_keyless(&self) -> bool {
        self.delete.is_empty()
    }

    /// Flat key for stores without a path hierarchy: `{urlfy(id)}:{lookup}`.
    pub fn namespaced(&self, id: &str) -> String {
        format!("{}:{}", urlfy(id), self.lookup)
    }
}
