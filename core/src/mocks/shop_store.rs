//! In-memory shop loader for testing.

use crate::error::{FlashSaleError, Result};
use crate::providers::EntityLoader;
use crate::types::Shop;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory durable shop table.
///
/// Counts every `load` so tests can assert how often the "durable store"
/// was actually hit; an optional artificial latency widens race windows
/// for single-flight tests.
#[derive(Clone, Default)]
pub struct MemoryShopStore {
    shops: Arc<Mutex<HashMap<i64, Shop>>>,
    loads: Arc<AtomicUsize>,
    delay: Duration,
}

impl MemoryShopStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add artificial latency to every load.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Insert or replace a shop row.
    ///
    /// # Panics
    ///
    /// Panics if the store mutex is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn insert(&self, shop: Shop) {
        self.shops.lock().unwrap().insert(shop.id, shop);
    }

    /// Number of durable loads performed so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl EntityLoader for MemoryShopStore {
    type Entity = Shop;

    async fn load(&self, id: i64) -> Result<Option<Shop>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        let shops = self
            .shops
            .lock()
            .map_err(|_| FlashSaleError::Internal("shop mutex poisoned".into()))?;
        Ok(shops.get(&id).cloned())
    }
}
