//! Reliable order-intake queue trait.

use crate::error::Result;
use crate::types::IntakeDelivery;
use std::time::Duration;

/// An append-only, consumer-group-tracked log of admission events.
///
/// Each enqueued record is delivered to exactly one consumer in the group
/// unless it goes unacknowledged; delivered-but-unacked records stay on the
/// group's pending list and are redelivered by [`read_pending`] after a
/// worker crash. Delivery is therefore at-least-once and processing must be
/// idempotent.
///
/// [`read_pending`]: IntakeQueue::read_pending
pub trait IntakeQueue: Send + Sync {
    /// Read up to `max` new records from the tail, blocking at most `block`.
    ///
    /// The bounded block keeps the worker loop live for shutdown checks; an
    /// empty result is normal and means "poll again".
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable.
    fn read_new(
        &self,
        max: usize,
        block: Duration,
    ) -> impl std::future::Future<Output = Result<Vec<IntakeDelivery>>> + Send;

    /// Read up to `max` records from the group's pending list (delivered but
    /// never acknowledged), without blocking.
    ///
    /// An empty result means the backlog is drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable.
    fn read_pending(
        &self,
        max: usize,
    ) -> impl std::future::Future<Output = Result<Vec<IntakeDelivery>>> + Send;

    /// Acknowledge one delivery, removing it from the pending list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unreachable.
    fn ack(&self, delivery_id: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}
