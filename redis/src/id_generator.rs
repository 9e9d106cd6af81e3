//! Redis-backed distributed id generator.
//!
//! Composes an epoch-relative timestamp (high bits) with a store-atomic
//! sequence (low bits). The sequence key rotates daily per scope, which
//! both bounds any single counter and gives operators a per-day issue
//! count for free.

use chrono::Utc;
use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::keys;
use flashsale_core::providers::{ID_EPOCH_SECONDS, IdGenerator, compose_order_id};
use flashsale_core::types::OrderId;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis-backed id generator.
#[derive(Clone)]
pub struct RedisIdGenerator {
    conn: ConnectionManager,
}

impl RedisIdGenerator {
    /// Create a generator over its own connection.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::KeyValueStore`] if the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Ok(Self::from_manager(crate::connect(redis_url).await?))
    }

    /// Create a generator over a shared connection manager.
    #[must_use]
    pub const fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl IdGenerator for RedisIdGenerator {
    async fn next_id(&self, scope: &str) -> Result<OrderId> {
        let now = Utc::now();
        let day = now.format("%Y:%m:%d");
        let key = format!("{}{scope}:{day}", keys::ID_KEY_PREFIX);

        let mut conn = self.conn.clone();
        let sequence: i64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("sequence incr failed: {e}")))?;

        let timestamp = now.timestamp() - ID_EPOCH_SECONDS;
        Ok(compose_order_id(timestamp, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashsale_core::providers::timestamp_of;
    use std::collections::HashSet;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn ids_are_unique_and_time_ordered() {
        let ids = RedisIdGenerator::new("redis://127.0.0.1:6379")
            .await
            .unwrap();

        let scope = format!("test:{}", uuid::Uuid::new_v4());
        let mut seen = HashSet::new();
        let mut previous = OrderId(0);
        for _ in 0..500 {
            let id = ids.next_id(&scope).await.unwrap();
            assert!(seen.insert(id), "duplicate id {id}");
            assert!(id >= previous);
            assert!(timestamp_of(id) > 0);
            previous = id;
        }
    }
}
