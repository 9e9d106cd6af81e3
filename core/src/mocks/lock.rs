//! In-memory distributed lock for testing.

use crate::error::{FlashSaleError, Result};
use crate::providers::DistributedLock;
use crate::types::LockLease;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// In-memory lease lock.
///
/// Acquisition and release each run inside one mutex critical section,
/// matching the single-round-trip atomicity of the real store: an expired
/// entry counts as absent, and release deletes only when the holder token
/// matches a live lease.
#[derive(Clone, Default)]
pub struct MemoryLock {
    inner: Arc<Mutex<HashMap<String, HeldLease>>>,
}

struct HeldLease {
    token: String,
    expires_at: Instant,
}

impl MemoryLock {
    /// Create a lock with no held leases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DistributedLock for MemoryLock {
    async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LockLease>> {
        let mut held = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("lock mutex poisoned".into()))?;

        let now = Instant::now();
        if held.get(key).is_some_and(|lease| lease.expires_at > now) {
            return Ok(None);
        }

        let token = Uuid::new_v4().simple().to_string();
        held.insert(
            key.to_string(),
            HeldLease {
                token: token.clone(),
                expires_at: now + lease,
            },
        );
        Ok(Some(LockLease {
            key: key.to_string(),
            token,
        }))
    }

    async fn release(&self, lease: &LockLease) -> Result<bool> {
        let mut held = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("lock mutex poisoned".into()))?;

        let matches = held
            .get(&lease.key)
            .is_some_and(|h| h.token == lease.token && h.expires_at > Instant::now());
        if matches {
            held.remove(&lease.key);
        }
        Ok(matches)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let lock = MemoryLock::new();
        let lease = lock
            .try_acquire("lock:order:1", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(lease.is_some());
        assert!(lock
            .try_acquire("lock:order:1", Duration::from_secs(10))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn expired_lease_can_be_reacquired() {
        let lock = MemoryLock::new();
        lock.try_acquire("lock:order:1", Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(lock
            .try_acquire("lock:order:1", Duration::from_secs(10))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn stale_holder_cannot_release_successor() {
        let lock = MemoryLock::new();
        let stale = lock
            .try_acquire("lock:order:1", Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let successor = lock
            .try_acquire("lock:order:1", Duration::from_secs(10))
            .await
            .unwrap()
            .unwrap();

        // The stale holder's release is a no-op on the successor's lease.
        assert!(!lock.release(&stale).await.unwrap());
        assert!(lock
            .try_acquire("lock:order:1", Duration::from_secs(10))
            .await
            .unwrap()
            .is_none());

        assert!(lock.release(&successor).await.unwrap());
    }

    #[tokio::test]
    async fn release_after_expiry_is_noop() {
        let lock = MemoryLock::new();
        let lease = lock
            .try_acquire("lock:order:1", Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!lock.release(&lease).await.unwrap());
    }
}
