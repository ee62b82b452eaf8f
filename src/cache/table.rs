//! Read cache implementation
//!
//! HashMap-based TTL cache with RwLock for concurrency.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::CacheEntry;

/// TTL cache of readings
pub struct ReadCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ReadCache {
    /// Create an empty cache; `ttl` is fixed for its lifetime
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh value for `key`, if any (read lock)
    pub fn get(&self, key: &str) -> Option<f64> {
        self.get_at(key, Instant::now())
    }

    /// Fresh value for `key` as seen at `now`
    pub fn get_at(&self, key: &str, now: Instant) -> Option<f64> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| entry.value)
    }

    /// Store a value fetched now (write lock)
    pub fn insert(&self, key: impl Into<String>, value: f64) {
        self.insert_at(key, value, Instant::now());
    }

    /// Store a value fetched at `fetched_at`
    pub fn insert_at(&self, key: impl Into<String>, value: f64, fetched_at: Instant) {
        self.entries
            .write()
            .insert(key.into(), CacheEntry { value, fetched_at });
    }

    /// Drop the entry for `key`; returns whether one existed
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Raw entry regardless of age
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).copied()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
