//! Redis-backed lease lock.
//!
//! Acquisition is one `SET key token NX EX lease` round trip; release is
//! one Lua script that deletes the key only when it still holds the
//! caller's token. Without the script, an expire-then-reacquire race lets
//! a stale holder delete its successor's lease.

use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::providers::DistributedLock;
use flashsale_core::types::LockLease;
use redis::Script;
use redis::aio::ConnectionManager;
use std::time::Duration;
use uuid::Uuid;

/// Identity-checked release: compare the holder token, delete on match.
const UNLOCK_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
end
return 0
";

/// Redis-backed distributed lock.
///
/// Leases are not renewed; callers size them above the critical-section
/// duration. Holder identity is a random token, not thread identity.
#[derive(Clone)]
pub struct RedisLock {
    conn: ConnectionManager,
    unlock: Script,
}

impl RedisLock {
    /// Create a lock provider over its own connection.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::KeyValueStore`] if the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Ok(Self::from_manager(crate::connect(redis_url).await?))
    }

    /// Create a lock provider over a shared connection manager.
    #[must_use]
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self {
            conn,
            unlock: Script::new(UNLOCK_SCRIPT),
        }
    }
}

impl DistributedLock for RedisLock {
    async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LockLease>> {
        let mut conn = self.conn.clone();
        let token = Uuid::new_v4().simple().to_string();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(lease.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("failed to acquire lock: {e}")))?;

        if acquired.is_none() {
            tracing::debug!(key = %key, "lock contended");
            return Ok(None);
        }

        Ok(Some(LockLease {
            key: key.to_string(),
            token,
        }))
    }

    async fn release(&self, lease: &LockLease) -> Result<bool> {
        let mut conn = self.conn.clone();

        let deleted: i64 = self
            .unlock
            .key(&lease.key)
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("failed to release lock: {e}")))?;

        if deleted == 0 {
            tracing::debug!(key = %lease.key, "lease expired or held by another holder");
        }
        Ok(deleted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    fn test_key(name: &str) -> String {
        format!("lock:test:{name}:{}", Uuid::new_v4())
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn acquire_is_exclusive() {
        let lock = RedisLock::new("redis://127.0.0.1:6379").await.unwrap();
        let key = test_key("exclusive");

        let lease = lock
            .try_acquire(&key, Duration::from_secs(10))
            .await
            .unwrap()
            .unwrap();
        assert!(lock
            .try_acquire(&key, Duration::from_secs(10))
            .await
            .unwrap()
            .is_none());

        assert!(lock.release(&lease).await.unwrap());
        assert!(lock
            .try_acquire(&key, Duration::from_secs(10))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn stale_holder_cannot_release_successor() {
        let lock = RedisLock::new("redis://127.0.0.1:6379").await.unwrap();
        let key = test_key("stale");

        let stale = lock
            .try_acquire(&key, Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let successor = lock
            .try_acquire(&key, Duration::from_secs(10))
            .await
            .unwrap()
            .unwrap();

        assert!(!lock.release(&stale).await.unwrap());
        assert!(lock
            .try_acquire(&key, Duration::from_secs(10))
            .await
            .unwrap()
            .is_none());
        assert!(lock.release(&successor).await.unwrap());
    }
}
