//! Bounded in-process cache with per-entry expiry

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::CacheBackend;
use crate::error::CacheError;

/// Default number of entries held before eviction kicks in
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process key-value map
///
/// Every operation completes under a single lock acquisition with no
/// suspension point inside. When full, expired entries are purged first,
/// then the entry closest to expiry is evicted.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    capacity: usize,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store a value; a zero TTL leaves the key absent
    pub fn set_value(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            entries.remove(key);
            return;
        }

        if !entries.contains_key(key) && entries.len() >= self.capacity {
            entries.retain(|_, e| !e.is_expired(now));

            if entries.len() >= self.capacity {
                // Entries without expiry sort last
                let victim = entries
                    .iter()
                    .min_by_key(|(_, e)| match e.expires_at {
                        Some(at) => (0u8, Some(at)),
                        None => (1u8, None),
                    })
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    entries.remove(&victim);
                }
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
    }

    pub fn delete_value(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.get_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.set_value(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.delete_value(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.contains(key))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
