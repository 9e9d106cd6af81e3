//! Redis-backed cache store.

use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::providers::CacheStore;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Plain string cache over Redis.
///
/// Values written with [`set`](CacheStore::set) carry no store-level TTL —
/// that is what makes logical-expiry entries stale-but-available instead
/// of gone.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    /// Create a cache store over its own connection.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::KeyValueStore`] if the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Ok(Self::from_manager(crate::connect(redis_url).await?))
    }

    /// Create a cache store over a shared connection manager.
    #[must_use]
    pub const fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("cache get failed: {e}")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(key, value)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("cache set failed: {e}")))?;
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("cache set failed: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("cache delete failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn ttl_and_plain_writes() {
        let cache = RedisCacheStore::new("redis://127.0.0.1:6379")
            .await
            .unwrap();
        let key = format!("cache:test:{}", Uuid::new_v4());

        cache.set(&key, "persistent").await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("persistent"));

        cache
            .set_with_ttl(&key, "fleeting", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("fleeting"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(cache.get(&key).await.unwrap().is_none());

        cache.set(&key, "back").await.unwrap();
        cache.delete(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }
}
