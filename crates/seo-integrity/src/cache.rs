//! In-memory key/value cache with time-to-live.
//!
//! ## Expiry
//!
//! TTL is checked when an entry is read; nothing runs in the background.
//! Call `cleanup_expired` to reclaim memory eagerly.
//!
//! ## LRU eviction
//!
//! With a capacity set, inserting a new key into a full cache evicts expired
//! entries first, otherwise the least-recently-accessed entry.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Cache entry with metadata.
struct CacheEntry<V> {
    value: V,
    /// When the entry was stored.
    cached_at: Instant,
    /// When the entry was last read (for LRU).
    last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() >= ttl
    }
}

/// Key → {value, timestamp} cache.
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
    max_entries: Option<usize>,
}

impl<K: Eq + Hash + Clone, V> TtlCache<K, V> {
    /// Unbounded cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: None,
        }
    }

    /// Bound the cache to `max_entries`, evicting on insert.
    pub fn with_capacity_limit(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a fresh value, touching it for LRU.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let ttl = self.ttl;
        let entry = self.entries.get_mut(key)?;
        if entry.is_expired(ttl) {
            return None;
        }
        entry.last_accessed = Instant::now();
        Some(&entry.value)
    }

    /// Whether a fresh value exists, without touching it.
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| !e.is_expired(self.ttl))
    }

    /// Store a value, restarting its TTL.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(max) = self.max_entries {
            if self.entries.len() >= max && !self.entries.contains_key(&key) {
                self.evict_one();
            }
        }
        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                cached_at: now,
                last_accessed: now,
            },
        );
    }

    /// Remove an entry.
    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Remove all expired entries; returns how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(ttl));
        before - self.entries.len()
    }

    /// Number of entries, including expired ones not yet cleaned up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_one(&mut self) {
        if self.cleanup_expired() > 0 {
            return;
        }
        if let Some(lru) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_accessed)
            .map(|(k, _)| k.clone())
        {
            tracing::debug!("evicting LRU cache entry");
            self.entries.remove(&lru);
        }
    }
}
