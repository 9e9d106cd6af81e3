//! Distributed mutual-exclusion lock trait.

use crate::error::Result;
use crate::types::LockLease;
use std::time::Duration;

/// A lease-based lock backed by the shared key-value store.
///
/// Ownership is exclusive per key for the lease duration. Leases bound the
/// worst-case staleness if a holder crashes; they are not renewed, so
/// callers must size the lease above the expected critical-section
/// duration.
///
/// # Implementation Notes
///
/// - Acquisition is a single atomic set-if-absent-with-expiry round trip.
/// - Release must be an atomic check-then-delete on the holder token,
///   executed store-side as one indivisible operation — never two round
///   trips — so an expired holder cannot delete a successor's lease.
pub trait DistributedLock: Send + Sync {
    /// Try to take `key` for `lease`.
    ///
    /// Non-blocking: returns `None` immediately on contention. Callers that
    /// need retry-with-backoff implement it themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable.
    fn try_acquire(
        &self,
        key: &str,
        lease: Duration,
    ) -> impl std::future::Future<Output = Result<Option<LockLease>>> + Send;

    /// Release a held lease.
    ///
    /// Returns `false` (a no-op) when the lease already expired or the key
    /// is now held by someone else.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable.
    fn release(&self, lease: &LockLease) -> impl std::future::Future<Output = Result<bool>> + Send;
}
