//! Cache-resilience layer for hot, read-mostly entities.
//!
//! Wraps durable reads with the three cache-failure mitigations:
//!
//! - **Penetration**: a durable miss writes a short-TTL null marker, so
//!   repeated queries for the same nonexistent id stop at the cache.
//! - **Breakdown**: logical-expiry entries carry no store-level TTL; a
//!   stale entry is served immediately while at most one caller (guarded by
//!   a per-key lock) refreshes it in the background.
//! - **Avalanche**: plain-TTL entries get a randomized TTL so mass-loaded
//!   keys do not all miss at once.

use crate::error::{FlashSaleError, Result};
use crate::keys;
use crate::providers::{CacheStore, DistributedLock, EntityLoader};
use crate::types::CacheEntry;
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Pause between attempts while another caller holds the reload lock.
const RELOAD_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Tuning knobs for one cached entity kind.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Cache key prefix, e.g. `cache:shop:`.
    pub key_prefix: String,
    /// Reload/refresh lock prefix, e.g. `lock:shop:`.
    pub lock_prefix: String,
    /// Base store-level TTL for plain entries.
    pub base_ttl: Duration,
    /// Maximum random offset applied around `base_ttl`.
    pub ttl_jitter: Duration,
    /// Store-level TTL for null markers; minutes-scale.
    pub null_ttl: Duration,
    /// Logical lifetime written on logical-expiry entries.
    pub logical_ttl: Duration,
    /// Lease on the reload/refresh lock.
    pub lock_lease: Duration,
    /// Bound on concurrently running background refreshes.
    pub refresh_workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: keys::SHOP_CACHE_PREFIX.to_string(),
            lock_prefix: keys::SHOP_LOCK_PREFIX.to_string(),
            base_ttl: Duration::from_secs(30 * 60),
            ttl_jitter: Duration::from_secs(5 * 60),
            null_ttl: Duration::from_secs(2 * 60),
            logical_ttl: Duration::from_secs(30 * 60),
            lock_lease: Duration::from_secs(10),
            refresh_workers: 10,
        }
    }
}

/// Resilient read-through cache over one entity kind.
#[derive(Clone)]
pub struct ResilientCache<L, C, K> {
    loader: L,
    cache: C,
    lock: K,
    config: CacheConfig,
    refresh_pool: Arc<Semaphore>,
}

impl<L, C, K> ResilientCache<L, C, K>
where
    L: EntityLoader + Clone + Send + Sync + 'static,
    L::Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    C: CacheStore + Clone + Send + Sync + 'static,
    K: DistributedLock + Clone + Send + Sync + 'static,
{
    /// Create a cache over a durable loader, a cache store, and a lock.
    pub fn new(loader: L, cache: C, lock: K, config: CacheConfig) -> Self {
        let refresh_pool = Arc::new(Semaphore::new(config.refresh_workers.max(1)));
        Self {
            loader,
            cache,
            lock,
            config,
            refresh_pool,
        }
    }

    fn cache_key(&self, id: i64) -> String {
        format!("{}{id}", self.config.key_prefix)
    }

    fn lock_key(&self, id: i64) -> String {
        format!("{}{id}", self.config.lock_prefix)
    }

    /// Randomize the store-level TTL within `base_ttl ± ttl_jitter`.
    fn jittered_ttl(&self) -> Duration {
        #[allow(clippy::cast_possible_truncation)] // TTLs are small durations
        let jitter_ms = self.config.ttl_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.config.base_ttl;
        }
        let offset = rand::thread_rng().gen_range(0..=2 * jitter_ms);
        let floor = self.config.base_ttl.saturating_sub(self.config.ttl_jitter);
        floor + Duration::from_millis(offset)
    }

    /// Read through the cache with store-level expiry.
    ///
    /// Cache hit and null-marker hit return without touching the durable
    /// store. A miss runs a single-flight reload: the caller that wins the
    /// per-key lock loads and rewrites the entry (a durable miss writes the
    /// null marker instead); losers back off briefly and re-check the
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache store, lock store, or durable store is
    /// unreachable, or a cached value fails to decode.
    pub async fn get_with_ttl(&self, id: i64) -> Result<Option<L::Entity>> {
        let key = self.cache_key(id);
        loop {
            if let Some(found) = self.read_cached(&key).await? {
                return Ok(found.into_entity());
            }

            let lock_key = self.lock_key(id);
            match self
                .lock
                .try_acquire(&lock_key, self.config.lock_lease)
                .await?
            {
                Some(lease) => {
                    let result = self.reload_with_ttl(id, &key).await;
                    if let Err(error) = self.lock.release(&lease).await {
                        tracing::warn!(error = %error, key = %lease.key, "failed to release reload lock");
                    }
                    return result;
                }
                None => {
                    // Someone else is reloading this key; wait for their write.
                    tokio::time::sleep(RELOAD_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn reload_with_ttl(&self, id: i64, key: &str) -> Result<Option<L::Entity>> {
        // The previous lock holder may have finished the reload already.
        if let Some(found) = self.read_cached(key).await? {
            return Ok(found.into_entity());
        }

        match self.loader.load(id).await? {
            Some(entity) => {
                let raw = serde_json::to_string(&entity)
                    .map_err(|e| FlashSaleError::Serialization(e.to_string()))?;
                self.cache
                    .set_with_ttl(key, &raw, self.jittered_ttl())
                    .await?;
                Ok(Some(entity))
            }
            None => {
                self.cache
                    .set_with_ttl(key, keys::NULL_MARKER, self.config.null_ttl)
                    .await?;
                metrics::counter!("flashsale.cache.null_cached").increment(1);
                Ok(None)
            }
        }
    }

    async fn read_cached(&self, key: &str) -> Result<Option<Cached<L::Entity>>> {
        let Some(raw) = self.cache.get(key).await? else {
            return Ok(None);
        };
        if raw == keys::NULL_MARKER {
            metrics::counter!("flashsale.cache.null_hit").increment(1);
            return Ok(Some(Cached::Missing));
        }
        let entity = serde_json::from_str(&raw)
            .map_err(|e| FlashSaleError::Serialization(e.to_string()))?;
        Ok(Some(Cached::Present(entity)))
    }

    /// Read through the cache with logical expiry, preferring availability
    /// over freshness.
    ///
    /// A fresh entry returns immediately. A logically expired entry is
    /// returned *as is* — stale but available — while the caller
    /// opportunistically tries the per-key lock; on success a background
    /// refresh is spawned on the bounded pool, on contention nothing
    /// happens (someone else is refreshing). An absent entry falls back to
    /// the durable store directly: hot keys are pre-warmed, so true absence
    /// is the rare cold-start path and needs no lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache store or durable store is unreachable,
    /// or the cached envelope fails to decode.
    pub async fn get_with_logical_expiry(&self, id: i64) -> Result<Option<L::Entity>> {
        let key = self.cache_key(id);
        let Some(raw) = self.cache.get(&key).await? else {
            return self.loader.load(id).await;
        };

        let entry: CacheEntry<L::Entity> = CacheEntry::decode(&raw)?;
        if !entry.is_expired(chrono::Utc::now()) {
            return Ok(Some(entry.data));
        }

        metrics::counter!("flashsale.cache.stale_served").increment(1);
        if let Err(error) = self.start_refresh(id, key).await {
            // The stale value is still good to serve; the refresh can wait
            // for the next reader.
            tracing::warn!(error = %error, id, "failed to start cache refresh");
        }
        Ok(Some(entry.data))
    }

    /// Load one entity and write it in logical-expiry form.
    ///
    /// Returns `false` when the entity does not exist durably. Used to
    /// pre-warm hot keys before they take traffic.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store or cache store is unreachable.
    pub async fn warm(&self, id: i64) -> Result<bool> {
        match self.loader.load(id).await? {
            Some(entity) => {
                let entry = CacheEntry::new(entity, self.config.logical_ttl);
                self.cache.set(&self.cache_key(id), &entry.encode()?).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop the cached copy of one entity.
    ///
    /// Call after a durable write so the next read re-loads.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache store is unreachable.
    pub async fn invalidate(&self, id: i64) -> Result<()> {
        self.cache.delete(&self.cache_key(id)).await
    }

    async fn start_refresh(&self, id: i64, key: String) -> Result<()> {
        let lock_key = self.lock_key(id);
        let Some(lease) = self
            .lock
            .try_acquire(&lock_key, self.config.lock_lease)
            .await?
        else {
            return Ok(());
        };

        let Ok(permit) = Arc::clone(&self.refresh_pool).try_acquire_owned() else {
            tracing::debug!(id, "refresh pool saturated, skipping refresh");
            if let Err(error) = self.lock.release(&lease).await {
                tracing::warn!(error = %error, key = %lease.key, "failed to release refresh lock");
            }
            return Ok(());
        };

        let loader = self.loader.clone();
        let cache = self.cache.clone();
        let lock = self.lock.clone();
        let logical_ttl = self.config.logical_ttl;

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(error) = refresh_entry(&loader, &cache, id, &key, logical_ttl).await {
                tracing::error!(error = %error, id, "background cache refresh failed");
            }
            if let Err(error) = lock.release(&lease).await {
                tracing::warn!(error = %error, key = %lease.key, "failed to release refresh lock");
            }
        });

        Ok(())
    }
}

/// Distinguishes a cached entity from a cached null marker.
enum Cached<T> {
    Present(T),
    Missing,
}

impl<T> Cached<T> {
    fn into_entity(self) -> Option<T> {
        match self {
            Self::Present(entity) => Some(entity),
            Self::Missing => None,
        }
    }
}

async fn refresh_entry<L, C>(
    loader: &L,
    cache: &C,
    id: i64,
    key: &str,
    logical_ttl: Duration,
) -> Result<()>
where
    L: EntityLoader,
    L::Entity: Serialize + DeserializeOwned,
    C: CacheStore,
{
    match loader.load(id).await? {
        Some(entity) => {
            let entry = CacheEntry::new(entity, logical_ttl);
            cache.set(key, &entry.encode()?).await
        }
        // Entity vanished durably; drop the stale copy rather than
        // refreshing it forever.
        None => cache.delete(key).await,
    }
}
