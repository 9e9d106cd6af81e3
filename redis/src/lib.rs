//! # FlashSale Redis
//!
//! Redis-backed providers for the flash-sale admission core: the atomic
//! admission script, the lease lock, the stream intake queue, the cache
//! store, and the id-sequence generator.
//!
//! All providers follow the same connection pattern: a
//! [`redis::aio::ConnectionManager`] created once and cheaply cloned per
//! call. Multi-key effects run as one server-side Lua script or one atomic
//! pipeline — never as separate round trips — because the correctness of
//! admission and lock release depends on store-side indivisibility.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod admission;
pub mod cache_store;
pub mod id_generator;
pub mod lock;
pub mod queue;

pub use admission::RedisAdmissionGate;
pub use cache_store::RedisCacheStore;
pub use id_generator::RedisIdGenerator;
pub use lock::RedisLock;
pub use queue::RedisIntakeQueue;

use flashsale_core::error::{FlashSaleError, Result};
use redis::Client;
use redis::aio::ConnectionManager;

/// Open a managed connection to the key-value store.
///
/// # Errors
///
/// Returns [`FlashSaleError::KeyValueStore`] if the URL is invalid or the
/// initial connection fails.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| FlashSaleError::KeyValueStore(format!("failed to create client: {e}")))?;
    ConnectionManager::new(client)
        .await
        .map_err(|e| FlashSaleError::KeyValueStore(format!("failed to connect: {e}")))
}
