//! Redis-stream-backed intake queue.
//!
//! One consumer group services the stream; each entry is delivered to
//! exactly one consumer unless it goes unacknowledged, in which case it
//! stays on the group's pending list until a recovery pass re-reads it
//! from offset `0`.

use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::keys;
use flashsale_core::providers::IntakeQueue;
use flashsale_core::types::{IntakeDelivery, IntakeRecord, OrderId, UserId, VoucherId};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use std::time::Duration;

/// Redis-stream intake queue bound to one consumer group and consumer.
#[derive(Clone)]
pub struct RedisIntakeQueue {
    conn: ConnectionManager,
    stream: String,
    group: String,
    consumer: String,
}

impl RedisIntakeQueue {
    /// Create a queue over its own connection, ensuring the consumer group
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::KeyValueStore`] if the connection or the
    /// group creation fails.
    pub async fn new(
        redis_url: &str,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Result<Self> {
        Self::from_manager(crate::connect(redis_url).await?, stream, group, consumer).await
    }

    /// Create a queue over a shared connection manager, ensuring the
    /// consumer group exists.
    ///
    /// The group starts at offset `0` so records appended before the first
    /// worker came up are not lost.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::KeyValueStore`] if the group creation
    /// fails for any reason other than the group already existing.
    pub async fn from_manager(
        conn: ConnectionManager,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Result<Self> {
        let queue = Self {
            conn,
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
        };

        let mut conn = queue.conn.clone();
        let created: redis::RedisResult<String> = conn
            .xgroup_create_mkstream(&queue.stream, &queue.group, "0")
            .await;
        match created {
            Ok(_) => {
                tracing::info!(
                    stream = %queue.stream,
                    group = %queue.group,
                    "consumer group created"
                );
            }
            // Another worker created the group first.
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => {
                return Err(FlashSaleError::KeyValueStore(format!(
                    "failed to create consumer group: {e}"
                )));
            }
        }

        Ok(queue)
    }

    async fn read(&self, max: usize, block: Option<Duration>) -> Result<Vec<IntakeDelivery>> {
        let mut conn = self.conn.clone();

        let mut options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(max);
        let offset = if let Some(block) = block {
            #[allow(clippy::cast_possible_truncation)] // Block timeouts are small durations
            {
                options = options.block(block.as_millis() as usize);
            }
            ">"
        } else {
            "0"
        };

        let reply: StreamReadReply = conn
            .xread_options(&[self.stream.as_str()], &[offset], &options)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("stream read failed: {e}")))?;

        let mut deliveries = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                match parse_entry(&entry) {
                    Ok(record) => deliveries.push(IntakeDelivery {
                        delivery_id: entry.id.clone(),
                        record,
                    }),
                    Err(error) => {
                        // A record that can never parse would wedge the
                        // pending recovery pass; discard it and leave the
                        // rest to operational reconciliation.
                        tracing::error!(
                            error = %error,
                            delivery_id = %entry.id,
                            "malformed intake record, discarding"
                        );
                        metrics::counter!("flashsale.queue.malformed").increment(1);
                        self.ack(&entry.id).await?;
                    }
                }
            }
        }
        Ok(deliveries)
    }
}

fn parse_entry(entry: &StreamId) -> Result<IntakeRecord> {
    Ok(IntakeRecord {
        order_id: OrderId(field(entry, keys::FIELD_ORDER_ID)?),
        user_id: UserId(field(entry, keys::FIELD_USER_ID)?),
        voucher_id: VoucherId(field(entry, keys::FIELD_VOUCHER_ID)?),
    })
}

fn field(entry: &StreamId, name: &str) -> Result<i64> {
    entry.get(name).ok_or_else(|| {
        FlashSaleError::Serialization(format!("intake record missing field {name}"))
    })
}

impl IntakeQueue for RedisIntakeQueue {
    async fn read_new(&self, max: usize, block: Duration) -> Result<Vec<IntakeDelivery>> {
        self.read(max, Some(block)).await
    }

    async fn read_pending(&self, max: usize) -> Result<Vec<IntakeDelivery>> {
        self.read(max, None).await
    }

    async fn ack(&self, delivery_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(&self.stream, &self.group, &[delivery_id])
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("ack failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    async fn queue() -> RedisIntakeQueue {
        let stream = format!("stream.test:{}", Uuid::new_v4());
        RedisIntakeQueue::new("redis://127.0.0.1:6379", stream, "g1", "c1")
            .await
            .expect("redis available")
    }

    async fn append(queue: &RedisIntakeQueue, order: i64, user: i64, voucher: i64) {
        let mut conn = queue.conn.clone();
        let _: String = conn
            .xadd(
                &queue.stream,
                "*",
                &[
                    (keys::FIELD_USER_ID, user.to_string()),
                    (keys::FIELD_VOUCHER_ID, voucher.to_string()),
                    (keys::FIELD_ORDER_ID, order.to_string()),
                ],
            )
            .await
            .expect("xadd");
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn delivers_and_acknowledges() {
        let queue = queue().await;
        append(&queue, 100, 1, 9).await;

        let deliveries = queue
            .read_new(8, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].record.order_id, OrderId(100));
        assert_eq!(deliveries[0].record.user_id, UserId(1));
        assert_eq!(deliveries[0].record.voucher_id, VoucherId(9));

        queue.ack(&deliveries[0].delivery_id).await.unwrap();
        assert!(queue.read_pending(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn malformed_records_are_discarded_and_acked() {
        let queue = queue().await;

        let mut conn = queue.conn.clone();
        let _: String = conn
            .xadd(&queue.stream, "*", &[("garbage", "true")])
            .await
            .expect("xadd");
        append(&queue, 100, 1, 9).await;

        // The malformed entry is dropped; the good one comes through.
        let deliveries = queue
            .read_new(8, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].record.order_id, OrderId(100));

        // The discard acknowledged the malformed entry, so the pending
        // list holds only the good record.
        let pending = queue.read_pending(8).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record.order_id, OrderId(100));
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn unacked_records_reappear_on_pending_read() {
        let queue = queue().await;
        append(&queue, 100, 1, 9).await;
        append(&queue, 101, 2, 9).await;

        // Deliver both, acknowledge neither: a crashed worker.
        let delivered = queue
            .read_new(8, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(delivered.len(), 2);

        let pending = queue.read_pending(8).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].record.order_id, OrderId(100));

        for delivery in &pending {
            queue.ack(&delivery.delivery_id).await.unwrap();
        }
        assert!(queue.read_pending(8).await.unwrap().is_empty());
    }
}
