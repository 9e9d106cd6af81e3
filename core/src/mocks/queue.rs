//! In-memory intake queue for testing.

use crate::error::{FlashSaleError, Result};
use crate::providers::IntakeQueue;
use crate::types::{IntakeDelivery, IntakeRecord};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory consumer-group queue.
///
/// Mirrors the stream semantics the materializer depends on: appended
/// records are delivered once from the backlog, delivered-but-unacked
/// records stay on the pending list, and `ack` removes them. A test can
/// simulate a worker crash by reading without acknowledging.
#[derive(Clone, Default)]
pub struct MemoryIntakeQueue {
    inner: Arc<Mutex<QueueState>>,
}

#[derive(Default)]
struct QueueState {
    next_entry: u64,
    backlog: VecDeque<IntakeDelivery>,
    pending: Vec<IntakeDelivery>,
}

impl MemoryIntakeQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, as the admission script's third effect does.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue mutex is poisoned.
    pub fn append(&self, record: IntakeRecord) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("queue mutex poisoned".into()))?;
        state.next_entry += 1;
        let delivery_id = format!("{}-0", state.next_entry);
        state.backlog.push_back(IntakeDelivery {
            delivery_id,
            record,
        });
        Ok(())
    }

    /// Number of delivered-but-unacknowledged records.
    ///
    /// # Panics
    ///
    /// Panics if the queue mutex is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    fn deliver(&self, max: usize) -> Result<Vec<IntakeDelivery>> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("queue mutex poisoned".into()))?;
        let mut deliveries = Vec::new();
        while deliveries.len() < max {
            let Some(delivery) = state.backlog.pop_front() else {
                break;
            };
            state.pending.push(delivery.clone());
            deliveries.push(delivery);
        }
        Ok(deliveries)
    }
}

impl IntakeQueue for MemoryIntakeQueue {
    async fn read_new(&self, max: usize, block: Duration) -> Result<Vec<IntakeDelivery>> {
        let deliveries = self.deliver(max)?;
        if !deliveries.is_empty() {
            return Ok(deliveries);
        }
        // Emulate a bounded blocking read without busy-spinning the caller.
        tokio::time::sleep(block.min(Duration::from_millis(10))).await;
        self.deliver(max)
    }

    async fn read_pending(&self, max: usize) -> Result<Vec<IntakeDelivery>> {
        let state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("queue mutex poisoned".into()))?;
        Ok(state.pending.iter().take(max).cloned().collect())
    }

    async fn ack(&self, delivery_id: &str) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| FlashSaleError::Internal("queue mutex poisoned".into()))?;
        state.pending.retain(|d| d.delivery_id != delivery_id);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{OrderId, UserId, VoucherId};

    fn record(order: i64) -> IntakeRecord {
        IntakeRecord {
            order_id: OrderId(order),
            user_id: UserId(1),
            voucher_id: VoucherId(1),
        }
    }

    #[tokio::test]
    async fn delivers_each_record_once() {
        let queue = MemoryIntakeQueue::new();
        queue.append(record(1)).unwrap();
        queue.append(record(2)).unwrap();

        let first = queue.read_new(8, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 2);
        let second = queue.read_new(8, Duration::ZERO).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn unacked_records_stay_pending() {
        let queue = MemoryIntakeQueue::new();
        queue.append(record(1)).unwrap();

        let delivered = queue.read_new(8, Duration::ZERO).await.unwrap();
        assert_eq!(queue.pending_len(), 1);

        let pending = queue.read_pending(8).await.unwrap();
        assert_eq!(pending, delivered);

        queue.ack(&delivered[0].delivery_id).await.unwrap();
        assert_eq!(queue.pending_len(), 0);
        assert!(queue.read_pending(8).await.unwrap().is_empty());
    }
}
