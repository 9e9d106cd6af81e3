//! Durable store traits.
//!
//! The durable store owns all source-of-truth state (voucher stock, order
//! rows); the key-value store only ever holds derived copies of it.

use crate::error::Result;
use crate::types::{Order, OrderWrite, UserId, Voucher, VoucherId};

/// Durable voucher persistence.
pub trait VoucherStore: Send + Sync {
    /// Persist a new voucher.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or the id collides.
    fn create_voucher(
        &self,
        voucher: &Voucher,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Fetch a voucher by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn get_voucher(
        &self,
        voucher_id: VoucherId,
    ) -> impl std::future::Future<Output = Result<Option<Voucher>>> + Send;
}

/// Durable order persistence.
pub trait OrderStore: Send + Sync {
    /// Count existing orders for a `(user, voucher)` pair.
    ///
    /// The authoritative one-per-user check; a non-zero count makes a
    /// redelivered intake record a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn count_orders(
        &self,
        user_id: UserId,
        voucher_id: VoucherId,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Decrement voucher stock and insert the order row, atomically.
    ///
    /// The decrement is a compare-and-set with a `stock > 0` predicate; both
    /// effects commit in one durable transaction. A zero-row decrement and a
    /// uniqueness collision are expected racing outcomes, reported as
    /// [`OrderWrite`] values.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or the transaction
    /// fails for any other reason.
    fn create_order(
        &self,
        order: &Order,
    ) -> impl std::future::Future<Output = Result<OrderWrite>> + Send;
}
