//! In-memory durable store for testing.

use crate::error::{FlashSaleError, Result};
use crate::providers::{OrderStore, VoucherStore};
use crate::types::{Order, OrderWrite, UserId, Voucher, VoucherId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory voucher and order store.
///
/// Preserves the durable protocol: the stock decrement and the order
/// insert happen in one critical section with a positive-stock predicate,
/// and `(user, voucher)` uniqueness is checked the way the SQL constraint
/// would.
#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    vouchers: HashMap<VoucherId, Voucher>,
    orders: Vec<Order>,
}

impl MemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all materialized orders, for assertions.
    ///
    /// # Panics
    ///
    /// Panics if the store mutex is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn orders(&self) -> Vec<Order> {
        self.inner.lock().unwrap().orders.clone()
    }
}

impl VoucherStore for MemoryOrderStore {
    async fn create_voucher(&self, voucher: &Voucher) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("store mutex poisoned".into()))?;
        state.vouchers.insert(voucher.id, voucher.clone());
        Ok(())
    }

    async fn get_voucher(&self, voucher_id: VoucherId) -> Result<Option<Voucher>> {
        let state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("store mutex poisoned".into()))?;
        Ok(state.vouchers.get(&voucher_id).cloned())
    }
}

impl OrderStore for MemoryOrderStore {
    async fn count_orders(&self, user_id: UserId, voucher_id: VoucherId) -> Result<u64> {
        let state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("store mutex poisoned".into()))?;
        let count = state
            .orders
            .iter()
            .filter(|order| order.user_id == user_id && order.voucher_id == voucher_id)
            .count();
        Ok(count as u64)
    }

    async fn create_order(&self, order: &Order) -> Result<OrderWrite> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("store mutex poisoned".into()))?;

        if state
            .orders
            .iter()
            .any(|existing| {
                existing.user_id == order.user_id && existing.voucher_id == order.voucher_id
            })
        {
            return Ok(OrderWrite::Duplicate);
        }

        let Some(voucher) = state.vouchers.get_mut(&order.voucher_id) else {
            return Ok(OrderWrite::StockExhausted);
        };
        if voucher.stock <= 0 {
            return Ok(OrderWrite::StockExhausted);
        }

        voucher.stock -= 1;
        state.orders.push(order.clone());
        Ok(OrderWrite::Created)
    }
}
