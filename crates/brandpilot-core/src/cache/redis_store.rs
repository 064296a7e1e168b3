//! Redis-backed cache store

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::CacheBackend;
use crate::error::CacheError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Remote key-value store reached through a multiplexed connection
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server answers PING
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let handshake = async {
            let mut manager = ConnectionManager::new(client).await?;
            let _: String = redis::cmd("PING").query_async(&mut manager).await?;
            Ok::<_, redis::RedisError>(manager)
        };
        let manager = tokio::time::timeout(CONNECT_TIMEOUT, handshake)
            .await
            .map_err(|_| {
                CacheError::Backend(format!(
                    "Timed out connecting to Redis after {} seconds",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })??;
        debug!("Connected to Redis");
        Ok(Self { manager })
    }
}

/// Expiry in whole milliseconds, rounded up; `None` for a zero TTL
///
/// A zero TTL means the value is already expired, the same as in the
/// in-process map, so the key is deleted instead of stored.
fn ttl_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    Some(if ttl.subsec_nanos() % 1_000_000 > 0 { millis + 1 } else { millis })
}

#[async_trait]
impl CacheBackend for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        match ttl.map(ttl_millis) {
            Some(Some(millis)) => conn.pset_ex::<_, _, ()>(key, value, millis).await?,
            Some(None) => conn.del::<_, ()>(key).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        Ok(conn.exists(key).await?)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(10)), Some(10_000));
        assert_eq!(ttl_millis(Duration::from_millis(1500)), Some(1500));
        assert_eq!(ttl_millis(Duration::from_micros(10)), Some(1));
        assert_eq!(ttl_millis(Duration::from_micros(2500)), Some(3));
    }

    #[test]
    fn test_zero_ttl_is_not_stored() {
        assert_eq!(ttl_millis(Duration::ZERO), None);
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails() {
        let result = RedisStore::connect("redis://127.0.0.1:1/0").await;
        assert!(result.is_err());
    }
}
