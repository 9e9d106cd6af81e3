//! Atomic admission gate trait.

use crate::error::Result;
use crate::types::{Admission, OrderId, UserId, VoucherId};

/// The fast-path admission check, evaluated atomically by the key-value
/// store.
///
/// One call validates cached stock and one-per-user eligibility and, when
/// eligible, decrements the counter, records the user, and enqueues the
/// intake record — all three effects applied as a single indivisible store
/// operation. No other code may read-then-write the cached stock or the
/// admitted-set.
///
/// The gate operates on a *cached* stock counter seeded from the durable
/// counter at sale-open time; the materializer's authoritative recheck makes
/// the pair correct under crash and replay.
pub trait AdmissionGate: Send + Sync {
    /// Run the admission check for one `(voucher, user)` attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable or the script
    /// fails; contention outcomes are values, not errors.
    fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> impl std::future::Future<Output = Result<Admission>> + Send;

    /// Seed the cached stock counter for a voucher and clear its
    /// admitted-set.
    ///
    /// This is the explicit warm-up step: admission correctness depends on
    /// the cached counter starting equal to durable stock.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable.
    fn seed_stock(
        &self,
        voucher_id: VoucherId,
        stock: i64,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Remove the cached counter and admitted-set for a closed sale.
    ///
    /// With the counter absent the gate admits nobody.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable.
    fn retire(
        &self,
        voucher_id: VoucherId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
