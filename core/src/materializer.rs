//! Order materializer: the worker that turns intake records into durable
//! order rows.
//!
//! The loop reads from the queue tail, materializes each record under a
//! per-user lock, and acknowledges it. Any read or processing failure
//! triggers a pending-list recovery pass that re-reads the group's
//! unacknowledged backlog until it is empty, so a crashed worker never
//! loses a record — at the cost of at-least-once delivery, which the
//! authoritative one-per-user check makes safe.

use crate::error::Result;
use crate::keys;
use crate::providers::{DistributedLock, IntakeQueue, OrderStore};
use crate::types::{IntakeDelivery, IntakeRecord, Order, OrderWrite};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;

/// Tuning knobs for the materializer loop.
#[derive(Clone, Debug)]
pub struct MaterializerConfig {
    /// Records pulled per read.
    pub batch_size: usize,
    /// Bound on a blocking tail read; the loop re-polls after this so
    /// shutdown checks stay live.
    pub block_timeout: Duration,
    /// Lease on the per-user materialization lock; must exceed one durable
    /// transaction.
    pub user_lock_lease: Duration,
    /// Pause after a failure inside the recovery pass.
    pub recovery_backoff: Duration,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            block_timeout: Duration::from_secs(2),
            user_lock_lease: Duration::from_secs(10),
            recovery_backoff: Duration::from_millis(20),
        }
    }
}

/// Worker that drains the intake queue into the durable store.
pub struct OrderMaterializer<Q, L, S> {
    queue: Q,
    lock: L,
    orders: S,
    config: MaterializerConfig,
}

impl<Q, L, S> OrderMaterializer<Q, L, S>
where
    Q: IntakeQueue,
    L: DistributedLock,
    S: OrderStore,
{
    /// Create a materializer over a queue, a lock, and the durable store.
    pub const fn new(queue: Q, lock: L, orders: S, config: MaterializerConfig) -> Self {
        Self {
            queue,
            lock,
            orders,
            config,
        }
    }

    /// Run until `shutdown` flips to `true`, then drain the pending list
    /// one final time before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("order materializer started");

        while !*shutdown.borrow() {
            tokio::select! {
                read = self.queue.read_new(self.config.batch_size, self.config.block_timeout) => {
                    match read {
                        Ok(deliveries) => {
                            for delivery in deliveries {
                                if let Err(error) = self.handle(&delivery).await {
                                    tracing::error!(
                                        error = %error,
                                        delivery_id = %delivery.delivery_id,
                                        "intake processing failed, running pending recovery"
                                    );
                                    self.drain_pending().await;
                                }
                            }
                        }
                        Err(error) => {
                            tracing::error!(
                                error = %error,
                                "intake read failed, running pending recovery"
                            );
                            self.drain_pending().await;
                        }
                    }
                }
                _ = shutdown.changed() => {}
            }
        }

        self.drain_pending().await;
        tracing::info!("order materializer stopped");
    }

    /// Re-read the group's unacknowledged backlog until it is empty,
    /// materializing and acknowledging each record.
    ///
    /// Failures inside the pass are logged and retried after a short
    /// backoff; the pass never gives a record up.
    pub async fn drain_pending(&self) {
        loop {
            match self.queue.read_pending(self.config.batch_size).await {
                Ok(deliveries) if deliveries.is_empty() => break,
                Ok(deliveries) => {
                    for delivery in deliveries {
                        if let Err(error) = self.handle(&delivery).await {
                            tracing::error!(
                                error = %error,
                                delivery_id = %delivery.delivery_id,
                                "pending record failed, backing off"
                            );
                            tokio::time::sleep(self.config.recovery_backoff).await;
                        }
                    }
                }
                Err(error) => {
                    tracing::error!(error = %error, "pending read failed, backing off");
                    tokio::time::sleep(self.config.recovery_backoff).await;
                }
            }
        }
    }

    async fn handle(&self, delivery: &IntakeDelivery) -> Result<()> {
        self.materialize(&delivery.record).await?;
        self.queue.ack(&delivery.delivery_id).await
    }

    /// Materialize one intake record.
    ///
    /// Contention outcomes (lock busy, duplicate, durable stock exhausted)
    /// resolve to `Ok` — the record is consumed either way. Only
    /// infrastructure failures propagate, leaving the record unacked for
    /// the recovery pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock store or the durable store is
    /// unreachable.
    pub async fn materialize(&self, record: &IntakeRecord) -> Result<()> {
        let lock_key = keys::order_lock_key(record.user_id);
        let Some(lease) = self
            .lock
            .try_acquire(&lock_key, self.config.user_lock_lease)
            .await?
        else {
            // Another worker holds this user; their in-flight attempt covers us.
            tracing::warn!(
                user_id = %record.user_id,
                voucher_id = %record.voucher_id,
                "user already being materialized, dropping record"
            );
            metrics::counter!("flashsale.materializer.lock_contended").increment(1);
            return Ok(());
        };

        let result = self.materialize_locked(record).await;

        if let Err(error) = self.lock.release(&lease).await {
            tracing::warn!(error = %error, key = %lease.key, "failed to release user lock");
        }

        result
    }

    async fn materialize_locked(&self, record: &IntakeRecord) -> Result<()> {
        if self
            .orders
            .count_orders(record.user_id, record.voucher_id)
            .await?
            > 0
        {
            tracing::info!(
                user_id = %record.user_id,
                voucher_id = %record.voucher_id,
                order_id = %record.order_id,
                "order already materialized, skipping redelivery"
            );
            metrics::counter!("flashsale.materializer.duplicate").increment(1);
            return Ok(());
        }

        let order = Order {
            id: record.order_id,
            user_id: record.user_id,
            voucher_id: record.voucher_id,
            created_at: Utc::now(),
        };

        match self.orders.create_order(&order).await? {
            OrderWrite::Created => {
                tracing::info!(
                    order_id = %order.id,
                    user_id = %order.user_id,
                    voucher_id = %order.voucher_id,
                    "order materialized"
                );
                metrics::counter!("flashsale.materializer.created").increment(1);
            }
            OrderWrite::StockExhausted => {
                // The fast-path gate already limited admissions to <= stock,
                // so this only fires on gate/durable drift.
                tracing::error!(
                    order_id = %order.id,
                    voucher_id = %order.voucher_id,
                    "durable stock exhausted, dropping admitted order"
                );
                metrics::counter!("flashsale.materializer.stock_exhausted").increment(1);
            }
            OrderWrite::Duplicate => {
                tracing::info!(
                    order_id = %order.id,
                    user_id = %order.user_id,
                    "duplicate order write lost the race, skipping"
                );
                metrics::counter!("flashsale.materializer.duplicate").increment(1);
            }
        }

        Ok(())
    }
}
