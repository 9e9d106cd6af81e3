//! In-memory admission gate for testing.

use crate::error::{FlashSaleError, Result};
use crate::mocks::MemoryIntakeQueue;
use crate::providers::AdmissionGate;
use crate::types::{Admission, IntakeRecord, OrderId, UserId, VoucherId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// In-memory admission gate.
///
/// One mutex stands in for the store's script atomicity: the stock check,
/// the admitted-set check, and all three effects (decrement, record user,
/// enqueue) happen inside a single critical section, so interleavings that
/// the real script forbids are impossible here too.
#[derive(Clone)]
pub struct MemoryAdmissionGate {
    inner: Arc<Mutex<GateState>>,
    queue: MemoryIntakeQueue,
}

#[derive(Default)]
struct GateState {
    stock: HashMap<VoucherId, i64>,
    admitted: HashMap<VoucherId, HashSet<UserId>>,
}

impl MemoryAdmissionGate {
    /// Create a gate appending intake records to `queue`.
    #[must_use]
    pub fn new(queue: MemoryIntakeQueue) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GateState::default())),
            queue,
        }
    }

    /// Remaining cached stock for a voucher, if seeded.
    ///
    /// # Panics
    ///
    /// Panics if the gate mutex is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn cached_stock(&self, voucher_id: VoucherId) -> Option<i64> {
        self.inner.lock().unwrap().stock.get(&voucher_id).copied()
    }
}

impl AdmissionGate for MemoryAdmissionGate {
    async fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Admission> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("gate mutex poisoned".into()))?;

        match state.stock.get(&voucher_id) {
            None => return Ok(Admission::OutOfStock),
            Some(stock) if *stock <= 0 => return Ok(Admission::OutOfStock),
            Some(_) => {}
        }

        if state
            .admitted
            .get(&voucher_id)
            .is_some_and(|set| set.contains(&user_id))
        {
            return Ok(Admission::AlreadyOrdered);
        }

        if let Some(stock) = state.stock.get_mut(&voucher_id) {
            *stock -= 1;
        }
        state.admitted.entry(voucher_id).or_default().insert(user_id);
        self.queue.append(IntakeRecord {
            order_id,
            user_id,
            voucher_id,
        })?;

        Ok(Admission::Admitted)
    }

    async fn seed_stock(&self, voucher_id: VoucherId, stock: i64) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("gate mutex poisoned".into()))?;
        state.stock.insert(voucher_id, stock);
        state.admitted.remove(&voucher_id);
        Ok(())
    }

    async fn retire(&self, voucher_id: VoucherId) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("gate mutex poisoned".into()))?;
        state.stock.remove(&voucher_id);
        state.admitted.remove(&voucher_id);
        Ok(())
    }
}
