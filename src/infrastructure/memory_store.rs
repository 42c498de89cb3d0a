//! In-memory entry store backing the reference cache server.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifetime limits of a stored entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifetime {
    /// Absolute lifetime, counted from the last write.
    pub time_to_live: Option<Duration>,
    /// Sliding lifetime, counted from the last read or write.
    pub max_idle: Option<Duration>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    lifetime: Lifetime,
    written_at: Instant,
    accessed_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        let ttl_over = self
            .lifetime
            .time_to_live
            .is_some_and(|ttl| now.duration_since(self.written_at) >= ttl);
        let idle_over = self
            .lifetime
            .max_idle
            .is_some_and(|idle| now.duration_since(self.accessed_at) >= idle);

        ttl_over || idle_over
    }
}

/// Namespaced key/value store with absolute and sliding expiry.
///
/// Expired entries are dropped lazily on access and in bulk by
/// [`MemoryStore::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an entry and marks it as accessed.
    pub fn get(&self, namespace: &str, key: &str) -> Option<(String, Lifetime)> {
        self.get_at(namespace, key, Instant::now())
    }

    fn get_at(&self, namespace: &str, key: &str, now: Instant) -> Option<(String, Lifetime)> {
        let mut namespaces = self.namespaces.write();
        let entries = namespaces.get_mut(namespace)?;

        if entries.get(key)?.is_expired(now) {
            entries.remove(key);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.accessed_at = now;
        Some((entry.value.clone(), entry.lifetime))
    }

    /// Reads an entry and restarts it under a new lifetime, so the absolute
    /// limit is counted again from now.
    pub fn get_renewed(
        &self,
        namespace: &str,
        key: &str,
        lifetime: Lifetime,
    ) -> Option<(String, Lifetime)> {
        self.get_renewed_at(namespace, key, lifetime, Instant::now())
    }

    fn get_renewed_at(
        &self,
        namespace: &str,
        key: &str,
        lifetime: Lifetime,
        now: Instant,
    ) -> Option<(String, Lifetime)> {
        let mut namespaces = self.namespaces.write();
        let entries = namespaces.get_mut(namespace)?;

        if entries.get(key)?.is_expired(now) {
            entries.remove(key);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.lifetime = lifetime;
        entry.written_at = now;
        entry.accessed_at = now;
        Some((entry.value.clone(), entry.lifetime))
    }

    pub fn put(&self, namespace: &str, key: &str, value: String, lifetime: Lifetime) {
        self.put_at(namespace, key, value, lifetime, Instant::now());
    }

    fn put_at(&self, namespace: &str, key: &str, value: String, lifetime: Lifetime, now: Instant) {
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(
                key.to_string(),
                Entry {
                    value,
                    lifetime,
                    written_at: now,
                    accessed_at: now,
                },
            );
    }

    /// Removes an entry; `false` if it was absent or already expired.
    pub fn remove(&self, namespace: &str, key: &str) -> bool {
        let now = Instant::now();
        let mut namespaces = self.namespaces.write();

        namespaces
            .get_mut(namespace)
            .and_then(|entries| entries.remove(key))
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Drops a whole namespace; `false` if it did not exist.
    pub fn clear(&self, namespace: &str) -> bool {
        self.namespaces.write().remove(namespace).is_some()
    }

    /// Drops every expired entry and empty namespace. Returns the number of
    /// entries removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut namespaces = self.namespaces.write();
        let mut purged = 0;

        for entries in namespaces.values_mut() {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            purged += before - entries.len();
        }

        namespaces.retain(|_, entries| !entries.is_empty());
        purged
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.namespaces.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifetime(ttl: Option<u64>, idle: Option<u64>) -> Lifetime {
        Lifetime {
            time_to_live: ttl.map(Duration::from_secs),
            max_idle: idle.map(Duration::from_secs),
        }
    }

    #[test]
    fn test_put_then_get() {
        let store = MemoryStore::new();
        store.put("ns", "k", "v".into(), lifetime(Some(60), None));

        let (value, life) = store.get("ns", "k").unwrap();

        assert_eq!(value, "v");
        assert_eq!(life.time_to_live, Some(Duration::from_secs(60)));
        assert!(store.get("other", "k").is_none());
    }

    #[test]
    fn test_time_to_live_is_absolute() {
        let store = MemoryStore::new();
        let start = Instant::now();
        store.put_at("ns", "k", "v".into(), lifetime(Some(10), None), start);

        assert!(store.get_at("ns", "k", start + Duration::from_secs(9)).is_some());
        assert!(store.get_at("ns", "k", start + Duration::from_secs(10)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_max_idle_slides_with_reads() {
        let store = MemoryStore::new();
        let start = Instant::now();
        store.put_at("ns", "k", "v".into(), lifetime(None, Some(10)), start);

        // each read inside the window pushes expiry forward
        for step in 1..=3 {
            let at = start + Duration::from_secs(8 * step);
            assert!(store.get_at("ns", "k", at).is_some());
        }

        let last_read = start + Duration::from_secs(24);
        assert!(store.get_at("ns", "k", last_read + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_ttl_caps_sliding_idle() {
        let store = MemoryStore::new();
        let start = Instant::now();
        store.put_at("ns", "k", "v".into(), lifetime(Some(15), Some(10)), start);

        assert!(store.get_at("ns", "k", start + Duration::from_secs(8)).is_some());
        assert!(store.get_at("ns", "k", start + Duration::from_secs(15)).is_none());
    }

    #[test]
    fn test_renewed_read_extends_time_to_live() {
        let store = MemoryStore::new();
        let start = Instant::now();
        store.put_at("ns", "k", "v".into(), lifetime(Some(10), None), start);

        let renewed_at = start + Duration::from_secs(8);
        let (_, life) = store
            .get_renewed_at("ns", "k", lifetime(Some(60), None), renewed_at)
            .unwrap();

        assert_eq!(life.time_to_live, Some(Duration::from_secs(60)));
        assert!(store.get_at("ns", "k", start + Duration::from_secs(30)).is_some());
        assert!(store.get_at("ns", "k", renewed_at + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_renewed_read_of_expired_entry_misses() {
        let store = MemoryStore::new();
        let start = Instant::now();
        store.put_at("ns", "k", "v".into(), lifetime(Some(1), None), start);

        let late = start + Duration::from_secs(2);
        assert!(store.get_renewed_at("ns", "k", lifetime(Some(60), None), late).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let store = MemoryStore::new();
        store.put("ns", "a", "1".into(), Lifetime::default());
        store.put("ns", "b", "2".into(), Lifetime::default());

        assert_eq!(store.namespace_count(), 1);
        assert!(store.remove("ns", "a"));
        assert!(!store.remove("ns", "a"));
        assert!(store.clear("ns"));
        assert!(!store.clear("ns"));
        assert!(store.get("ns", "b").is_none());
    }

    #[test]
    fn test_purge_expired() {
        let store = MemoryStore::new();
        let start = Instant::now();
        store.put_at("a", "k", "v".into(), lifetime(Some(1), None), start);
        store.put_at("b", "k", "v".into(), lifetime(None, None), start);

        assert_eq!(store.purge_expired_at(start + Duration::from_secs(2)), 1);
        assert_eq!(store.len(), 1);
    }
}
