//! Session cache
//!
//! Key-value storage with expiration used for completion caching and
//! session persistence. A remote Redis store is preferred; when it is
//! disabled, unreachable at startup, or fails an individual operation,
//! the bounded in-process map answers instead with the same TTL rules.

pub mod memory;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;

pub use memory::MemoryCache;
pub use redis_store::RedisStore;

/// Lifetime of stored session data
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A key-value store with optional per-entry TTL
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Returns whether a key was removed
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Short backend label for logs and diagnostics
    fn name(&self) -> &'static str;
}

/// Cache front that hides which backend served a request
pub struct SessionCache {
    remote: Option<Arc<dyn CacheBackend>>,
    local: MemoryCache,
}

impl SessionCache {
    /// Cache backed only by the in-process map
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            remote: None,
            local: MemoryCache::new(capacity),
        }
    }

    /// Cache with an explicit remote backend
    pub fn with_remote(remote: Arc<dyn CacheBackend>, capacity: usize) -> Self {
        Self {
            remote: Some(remote),
            local: MemoryCache::new(capacity),
        }
    }

    /// Build the cache described by `config`, connecting to Redis when enabled
    pub async fn connect(config: &CacheConfig) -> Self {
        if !config.use_redis {
            info!("Remote cache disabled, using in-process cache");
            return Self::in_memory(config.memory_capacity);
        }

        match RedisStore::connect(&config.connection_url()).await {
            Ok(store) => {
                info!(host = %config.host, port = config.port, "Using Redis session cache");
                Self::with_remote(Arc::new(store), config.memory_capacity)
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to in-process cache");
                Self::in_memory(config.memory_capacity)
            }
        }
    }

    /// Name of the primary backend
    pub fn backend_name(&self) -> &'static str {
        self.remote.as_ref().map_or("memory", |r| r.name())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(value) => return value,
                Err(e) => warn!(key, error = %e, "Remote cache get failed, using local cache"),
            }
        }
        self.local.get_value(key)
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        if let Some(remote) = &self.remote {
            match remote.set(key, value, ttl).await {
                Ok(()) => return,
                Err(e) => warn!(key, error = %e, "Remote cache set failed, using local cache"),
            }
        }
        self.local.set_value(key, value, ttl);
    }

    pub async fn delete(&self, key: &str) -> bool {
        if let Some(remote) = &self.remote {
            match remote.delete(key).await {
                Ok(removed) => return removed | self.local.delete_value(key),
                Err(e) => warn!(key, error = %e, "Remote cache delete failed, using local cache"),
            }
        }
        self.local.delete_value(key)
    }

    pub async fn exists(&self, key: &str) -> bool {
        if let Some(remote) = &self.remote {
            match remote.exists(key).await {
                Ok(found) => return found,
                Err(e) => warn!(key, error = %e, "Remote cache exists failed, using local cache"),
            }
        }
        self.local.contains(key)
    }

    /// Store a JSON value
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(value)?;
        self.set(key, &encoded, ttl).await;
        Ok(())
    }

    /// Load a JSON value; a missing key is `Ok(None)`
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn store_session_data<T: Serialize>(
        &self,
        session_id: &str,
        data: &T,
    ) -> Result<(), CacheError> {
        self.set_json(&session_key(session_id), data, Some(SESSION_TTL)).await
    }

    pub async fn get_session_data<T: DeserializeOwned>(
        &self,
        session_id: &str,
    ) -> Result<Option<T>, CacheError> {
        self.get_json(&session_key(session_id)).await
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.delete(&session_key(session_id)).await
    }
}

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
        async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_remote_falls_back_with_same_ttl() {
        let cache = SessionCache::with_remote(Arc::new(BrokenBackend), 10);
        cache.set("k", "v", Some(Duration::from_secs(3))).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        assert!(cache.exists("k").await);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get("k").await.is_none());
        assert!(!cache.exists("k").await);
    }

    #[tokio::test]
    async fn test_session_data_round_trip() {
        let cache = SessionCache::in_memory(10);
        let data = json!({"history": ["hi"], "turns": 1});
        cache.store_session_data("abc", &data).await.unwrap();

        let loaded: Option<serde_json::Value> = cache.get_session_data("abc").await.unwrap();
        assert_eq!(loaded, Some(data));
        assert!(cache.exists("session:abc").await);

        assert!(cache.delete_session("abc").await);
        let gone: Option<serde_json::Value> = cache.get_session_data("abc").await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_disabled_redis_uses_memory() {
        let config = CacheConfig {
            use_redis: false,
            ..Default::default()
        };
        let cache = SessionCache::connect(&config).await;
        assert_eq!(cache.backend_name(), "memory");
    }
}
