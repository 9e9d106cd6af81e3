//! In-memory cache store for testing.

use crate::error::{FlashSaleError, Result};
use crate::providers::CacheStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// In-memory string cache with store-level expiry.
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    inner: Arc<Mutex<HashMap<String, CacheSlot>>>,
}

struct CacheSlot {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryCacheStore {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining store-level TTL of a key, for assertions.
    ///
    /// `None` when the key is absent or has no expiry.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn expires_in(&self, key: &str) -> Option<Duration> {
        let slots = self.inner.lock().unwrap();
        slots
            .get(key)
            .and_then(|slot| slot.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut slots = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("cache mutex poisoned".into()))?;
        let expired = slots
            .get(key)
            .is_some_and(|slot| slot.expires_at.is_some_and(|at| at <= Instant::now()));
        if expired {
            slots.remove(key);
            return Ok(None);
        }
        Ok(slots.get(key).map(|slot| slot.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("cache mutex poisoned".into()))?;
        slots.insert(
            key.to_string(),
            CacheSlot {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut slots = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("cache mutex poisoned".into()))?;
        slots.insert(
            key.to_string(),
            CacheSlot {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut slots = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("cache mutex poisoned".into()))?;
        slots.remove(key);
        Ok(())
    }
}
