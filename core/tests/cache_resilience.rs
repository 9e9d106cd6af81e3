//! Cache-resilience properties under concurrent readers.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use flashsale_core::cache::{CacheConfig, ResilientCache};
use flashsale_core::mocks::{MemoryCacheStore, MemoryLock, MemoryShopStore};
use flashsale_core::types::Shop;
use std::time::Duration;

fn shop(id: i64, score: i32) -> Shop {
    Shop {
        id,
        name: format!("shop-{id}"),
        address: "1 Main St".into(),
        score,
    }
}

fn config(logical_ttl: Duration) -> CacheConfig {
    CacheConfig {
        base_ttl: Duration::from_secs(60),
        ttl_jitter: Duration::from_secs(10),
        null_ttl: Duration::from_secs(60),
        logical_ttl,
        ..CacheConfig::default()
    }
}

#[tokio::test]
async fn concurrent_misses_hit_durable_store_once() {
    let loader = MemoryShopStore::new().with_delay(Duration::from_millis(30));
    loader.insert(shop(1, 40));
    let cache = ResilientCache::new(
        loader.clone(),
        MemoryCacheStore::new(),
        MemoryLock::new(),
        config(Duration::from_secs(60)),
    );

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_with_ttl(1).await })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        assert_eq!(handle.unwrap().unwrap().unwrap().id, 1);
    }
    assert_eq!(loader.load_count(), 1);
}

#[tokio::test]
async fn nonexistent_id_costs_one_durable_lookup() {
    let loader = MemoryShopStore::new();
    let cache = ResilientCache::new(
        loader.clone(),
        MemoryCacheStore::new(),
        MemoryLock::new(),
        config(Duration::from_secs(60)),
    );

    assert!(cache.get_with_ttl(404).await.unwrap().is_none());
    for _ in 0..10 {
        assert!(cache.get_with_ttl(404).await.unwrap().is_none());
    }
    assert_eq!(loader.load_count(), 1);
}

#[tokio::test]
async fn stale_reads_are_immediate_and_refresh_single_flight() {
    let loader = MemoryShopStore::new().with_delay(Duration::from_millis(50));
    loader.insert(shop(1, 40));
    let store = MemoryCacheStore::new();
    let cache = ResilientCache::new(
        loader.clone(),
        store.clone(),
        MemoryLock::new(),
        config(Duration::ZERO), // entries are stale the moment they land
    );

    assert!(cache.warm(1).await.unwrap());
    let warm_loads = loader.load_count();
    loader.insert(shop(1, 55));

    // Twenty concurrent readers of a stale entry: every one is served the
    // old payload without waiting on the durable store.
    let started = std::time::Instant::now();
    let handles: Vec<_> = (0..20)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_with_logical_expiry(1).await })
        })
        .collect();
    for handle in futures::future::join_all(handles).await {
        assert_eq!(handle.unwrap().unwrap().unwrap().score, 40);
    }
    assert!(
        started.elapsed() < Duration::from_millis(40),
        "stale reads must not block on the loader"
    );

    // Exactly one of them won the refresh lock.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(loader.load_count(), warm_loads + 1);

    let refreshed = cache.get_with_logical_expiry(1).await.unwrap().unwrap();
    assert_eq!(refreshed.score, 55);
}

#[tokio::test]
async fn ttl_jitter_stays_within_bounds() {
    let loader = MemoryShopStore::new();
    let store = MemoryCacheStore::new();
    for id in 0..50 {
        loader.insert(shop(id, 40));
    }
    let cache = ResilientCache::new(
        loader,
        store.clone(),
        MemoryLock::new(),
        config(Duration::from_secs(60)),
    );

    for id in 0..50 {
        cache.get_with_ttl(id).await.unwrap();
        let ttl = store.expires_in(&format!("cache:shop:{id}")).unwrap();
        assert!(ttl >= Duration::from_secs(49), "ttl {ttl:?} below jitter floor");
        assert!(ttl <= Duration::from_secs(70), "ttl {ttl:?} above jitter ceiling");
    }
}
