//! Keyed in-memory store with freshness and idleness timestamps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

use liftline_core::normalize_key;

/// One cached resource.
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    /// Normalized key
    pub key: String,
    /// Last successfully fetched value, if any
    pub value: Option<T>,
    /// When `value` was fetched (monotonic)
    pub fetched_at: Option<Instant>,
    /// When `value` was fetched (wall clock, for reporting)
    pub fetched_at_utc: Option<DateTime<Utc>>,
    /// Last time anybody asked for this key
    pub last_requested_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(key: String, now: Instant) -> Self {
        Self {
            key,
            value: None,
            fetched_at: None,
            fetched_at_utc: None,
            last_requested_at: now,
        }
    }

    /// Returns true if the entry holds a value fetched less than `ttl` ago.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        match (&self.value, self.fetched_at) {
            (Some(_), Some(at)) => now.saturating_duration_since(at) < ttl,
            _ => false,
        }
    }

    /// Time since the entry was last requested.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_requested_at)
    }
}

/// Keyed store of [`CacheEntry`] values.
///
/// Cloning the store clones a handle; all clones share the same map. The store
/// never evicts on its own; [`KeyedCacheStore::evict_idle`] is driven by the
/// sweeper.
pub struct KeyedCacheStore<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
}

impl<T> Clone for KeyedCacheStore<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: Clone> KeyedCacheStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns a snapshot of the entry for `key`, or `None` if never seen.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.read().get(&normalize_key(key)).cloned()
    }

    /// Returns the cached value for `key`, fresh or not.
    pub fn value(&self, key: &str) -> Option<T> {
        self.entries
            .read()
            .get(&normalize_key(key))
            .and_then(|e| e.value.clone())
    }

    /// Returns the cached value for `key` only if it is younger than `ttl`.
    pub fn fresh_value(&self, key: &str, ttl: Duration, now: Instant) -> Option<T> {
        self.entries
            .read()
            .get(&normalize_key(key))
            .filter(|e| e.is_fresh(ttl, now))
            .and_then(|e| e.value.clone())
    }

    /// Records a request for `key`, creating the entry on first sight.
    ///
    /// Returns a snapshot of the entry after the update.
    pub fn touch(&self, key: &str, now: Instant) -> CacheEntry<T> {
        let key = normalize_key(key);
        let mut entries = self.entries.write();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key, now));
        entry.last_requested_at = now;
        entry.clone()
    }

    /// Stores a successfully fetched value.
    ///
    /// Re-creates the entry if it was evicted while the fetch was running.
    pub fn commit(&self, key: &str, value: T, now: Instant) {
        let key = normalize_key(key);
        let mut entries = self.entries.write();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key, now));
        entry.value = Some(value);
        entry.fetched_at = Some(now);
        entry.fetched_at_utc = Some(Utc::now());
    }

    /// Removes entries idle longer than `idle` unless `skip` says otherwise.
    ///
    /// Returns the dropped keys with how long each had been idle.
    pub fn evict_idle<F>(&self, idle: Duration, now: Instant, skip: F) -> Vec<(String, Duration)>
    where
        F: Fn(&str) -> bool,
    {
        let mut entries = self.entries.write();
        let mut dropped = Vec::new();
        entries.retain(|key, entry| {
            if skip(key) {
                return true;
            }
            let idle_for = entry.idle_for(now);
            if idle_for > idle {
                dropped.push((key.clone(), idle_for));
                false
            } else {
                true
            }
        });
        dropped
    }

    /// Removes one entry.
    pub fn remove(&self, key: &str) {
        self.entries.write().remove(&normalize_key(key));
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns the cached keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns a snapshot of every entry, sorted by key.
    pub fn snapshot(&self) -> Vec<CacheEntry<T>> {
        let mut entries: Vec<CacheEntry<T>> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Clone> Default for KeyedCacheStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(90);

    #[test]
    fn test_get_unseen_key() {
        let store: KeyedCacheStore<u32> = KeyedCacheStore::new();
        assert!(store.get("vail").is_none());
        assert!(store.value("vail").is_none());
    }

    #[test]
    fn test_touch_creates_empty_entry() {
        let store: KeyedCacheStore<u32> = KeyedCacheStore::new();
        let now = Instant::now();
        let entry = store.touch("Vail", now);
        assert_eq!(entry.key, "vail");
        assert!(entry.value.is_none());
        assert!(!entry.is_fresh(TTL, now));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_commit_and_freshness() {
        let store = KeyedCacheStore::new();
        let t0 = Instant::now();
        store.commit("vail", 7u32, t0);

        let entry = store.get("VAIL").unwrap();
        assert_eq!(entry.value, Some(7));
        assert!(entry.fetched_at_utc.is_some());
        assert!(entry.is_fresh(TTL, t0 + Duration::from_secs(30)));
        assert!(!entry.is_fresh(TTL, t0 + Duration::from_secs(95)));
        assert_eq!(store.fresh_value("vail", TTL, t0 + Duration::from_secs(95)), None);
        assert_eq!(store.value("vail"), Some(7));
    }

    #[test]
    fn test_touch_keeps_value() {
        let store = KeyedCacheStore::new();
        let t0 = Instant::now();
        store.commit("vail", 1u32, t0);
        let entry = store.touch("vail", t0 + Duration::from_secs(5));
        assert_eq!(entry.value, Some(1));
        assert_eq!(entry.fetched_at, Some(t0));
        assert_eq!(entry.last_requested_at, t0 + Duration::from_secs(5));
    }

    #[test]
    fn test_evict_idle_respects_skip() {
        let store = KeyedCacheStore::new();
        let t0 = Instant::now();
        store.touch("old", t0);
        store.touch("busy", t0);
        store.touch("recent", t0 + Duration::from_secs(500));
        store.commit("old", 1u32, t0);

        let dropped = store.evict_idle(Duration::from_secs(600), t0 + Duration::from_secs(700), |k| k == "busy");

        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].0, "old");
        assert_eq!(store.keys(), vec!["busy".to_string(), "recent".to_string()]);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = KeyedCacheStore::new();
        let now = Instant::now();
        store.commit("a", 1u32, now);
        store.commit("b", 2u32, now);
        store.remove("A");
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }
}
