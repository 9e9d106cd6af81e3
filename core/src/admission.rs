//! Fast-path admission service.
//!
//! Pairs the id generator with the atomic admission gate: the buyer learns
//! the outcome (and their order id) from a single store round trip, while
//! the durable order write happens asynchronously behind the intake queue.

use crate::error::Result;
use crate::keys;
use crate::providers::{AdmissionGate, IdGenerator};
use crate::types::{Admission, AdmissionOutcome, UserId, VoucherId};

/// Order-admission front door.
///
/// `submit` resolves all buyer-facing concurrency inside one atomic store
/// operation; everything after it (queue drainage, durable write) is
/// invisible to the buyer.
#[derive(Clone)]
pub struct AdmissionService<I, G> {
    ids: I,
    gate: G,
}

impl<I, G> AdmissionService<I, G>
where
    I: IdGenerator,
    G: AdmissionGate,
{
    /// Create a service over an id generator and an admission gate.
    pub const fn new(ids: I, gate: G) -> Self {
        Self { ids, gate }
    }

    /// Submit one admission attempt for `(voucher, user)`.
    ///
    /// On success the returned order id is already final: the intake record
    /// carrying it was enqueued by the same atomic operation that reserved
    /// the stock.
    ///
    /// # Errors
    ///
    /// Returns an error if the id generator or the gate's backing store is
    /// unreachable. Sold-out and duplicate attempts are outcomes, not
    /// errors, and are never retried here.
    pub async fn submit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
    ) -> Result<AdmissionOutcome> {
        let order_id = self.ids.next_id(keys::ORDER_ID_SCOPE).await?;

        match self.gate.admit(voucher_id, user_id, order_id).await? {
            Admission::Admitted => {
                tracing::debug!(
                    voucher_id = %voucher_id,
                    user_id = %user_id,
                    order_id = %order_id,
                    "admission granted"
                );
                metrics::counter!("flashsale.admission.admitted").increment(1);
                Ok(AdmissionOutcome::Admitted { order_id })
            }
            Admission::OutOfStock => {
                tracing::debug!(voucher_id = %voucher_id, user_id = %user_id, "sold out");
                metrics::counter!("flashsale.admission.out_of_stock").increment(1);
                Ok(AdmissionOutcome::OutOfStock)
            }
            Admission::AlreadyOrdered => {
                tracing::debug!(
                    voucher_id = %voucher_id,
                    user_id = %user_id,
                    "duplicate admission attempt"
                );
                metrics::counter!("flashsale.admission.already_ordered").increment(1);
                Ok(AdmissionOutcome::AlreadyOrdered)
            }
        }
    }

    /// Open a sale: seed the gate's cached counter with the voucher's
    /// durable stock.
    ///
    /// Must be called before the first `submit` for the voucher — the gate
    /// rejects everything while its counter is absent. Re-opening clears
    /// the previous admitted-set.
    ///
    /// # Errors
    ///
    /// Returns an error if the gate's backing store is unreachable.
    pub async fn open_sale(&self, voucher_id: VoucherId, stock: i64) -> Result<()> {
        self.gate.seed_stock(voucher_id, stock).await?;
        tracing::info!(voucher_id = %voucher_id, stock, "sale opened");
        Ok(())
    }

    /// Close a sale: retire the cached counter and admitted-set.
    ///
    /// # Errors
    ///
    /// Returns an error if the gate's backing store is unreachable.
    pub async fn close_sale(&self, voucher_id: VoucherId) -> Result<()> {
        self.gate.retire(voucher_id).await?;
        tracing::info!(voucher_id = %voucher_id, "sale closed");
        Ok(())
    }
}
