//! Time-bounded memoization of entity lookups.
//!
//! Entries expire lazily: a read past `max_age` evicts the entry and reports
//! a miss. Time comes from `tokio::time`, so a paused runtime clock drives
//! expiry in tests.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug, Clone)]
pub struct EntityCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    max_age: Duration,
}

impl<V: Clone> Default for EntityCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}

impl<V: Clone> EntityCache<V> {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.max_age => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop one key, or everything when `key` is `None`.
    pub fn invalidate(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.entries.remove(key);
            }
            None => self.entries.clear(),
        }
    }

    /// Stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
