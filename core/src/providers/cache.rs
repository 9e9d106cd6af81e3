//! Cache store and durable loader traits for the resilience layer.

use crate::error::Result;
use std::time::Duration;

/// String-valued cache storage with optional store-level expiry.
///
/// [`set`](CacheStore::set) writes without a TTL (logical-expiry entries
/// manage their own staleness); [`set_with_ttl`](CacheStore::set_with_ttl)
/// is for plain entries and null markers.
pub trait CacheStore: Send + Sync {
    /// Read a raw cache value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<String>>> + Send;

    /// Write a value with no store-level expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn set(&self, key: &str, value: &str)
    -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write a value that the store drops after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Remove a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// The durable read behind a cached entity.
pub trait EntityLoader: Send + Sync {
    /// The entity type this loader produces.
    type Entity: Send;

    /// Load the entity from the durable store.
    ///
    /// `Ok(None)` means the entity genuinely does not exist — the cache
    /// layer turns that into a null marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store is unreachable.
    fn load(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Self::Entity>>> + Send;
}
