//! Domain types for the flash-sale admission subsystem.
//!
//! Value objects shared by the fast-path admission gate, the intake queue,
//! the order materializer, and the cache-resilience layer.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a voucher on sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoucherId(pub i64);

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a buyer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique, time-ordered identifier for an order.
///
/// Produced by an [`IdGenerator`](crate::providers::IdGenerator); the high
/// bits carry seconds since a fixed epoch, the low bits a store-assigned
/// sequence, so ids sort by creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A time-limited voucher with a finite durable stock.
///
/// Stock never goes negative: the durable counter is only ever decremented
/// through a compare-and-set with a positive-stock predicate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    /// Voucher identifier.
    pub id: VoucherId,
    /// Remaining durable stock.
    pub stock: i64,
    /// Start of the sale window.
    pub begin_at: DateTime<Utc>,
    /// End of the sale window.
    pub end_at: DateTime<Utc>,
}

/// A materialized order row.
///
/// For a given `(user_id, voucher_id)` pair at most one order ever exists;
/// the admitted-set enforces this approximately on the fast path and the
/// durable store enforces it authoritatively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier, assigned at admission time.
    pub id: OrderId,
    /// The buyer.
    pub user_id: UserId,
    /// The voucher bought.
    pub voucher_id: VoucherId,
    /// Materialization timestamp.
    pub created_at: DateTime<Utc>,
}

/// A hot, read-mostly catalog entity served through the resilient cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    /// Shop identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Aggregated rating, tenths of a star.
    pub score: i32,
}

// ============================================================================
// Intake queue records
// ============================================================================

/// A transient admission event appended to the intake queue.
///
/// Created by the atomic admission check, consumed effectively-once by the
/// materializer, acknowledged on success, redelivered from the pending list
/// if the consumer dies mid-processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntakeRecord {
    /// Order id handed to the buyer at admission time.
    pub order_id: OrderId,
    /// The admitted buyer.
    pub user_id: UserId,
    /// The voucher bought.
    pub voucher_id: VoucherId,
}

/// An intake record together with its store-assigned delivery id.
///
/// The delivery id keys acknowledgment and pending-list redelivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntakeDelivery {
    /// Store-assigned id of the queue entry.
    pub delivery_id: String,
    /// The admission event carried by the entry.
    pub record: IntakeRecord,
}

// ============================================================================
// Operation outcomes
// ============================================================================

/// Result of the atomic admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Stock reserved, user recorded, intake record enqueued.
    Admitted,
    /// Cached stock is exhausted (or the sale is not open).
    OutOfStock,
    /// The user is already in the voucher's admitted-set.
    AlreadyOrdered,
}

/// Result of submitting an admission request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// The buyer is in; the durable order follows asynchronously.
    Admitted {
        /// The id the durable order will carry.
        order_id: OrderId,
    },
    /// Sold out.
    OutOfStock,
    /// This user already bought this voucher.
    AlreadyOrdered,
}

/// Result of the durable order write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderWrite {
    /// Stock decremented and order row inserted.
    Created,
    /// The compare-and-set decrement affected zero rows.
    StockExhausted,
    /// An order for this `(user, voucher)` pair already exists.
    Duplicate,
}

// ============================================================================
// Lock lease
// ============================================================================

/// A held lease on a distributed lock key.
///
/// The token is random per acquisition; release compares it store-side so a
/// holder whose lease expired cannot delete a successor's lease.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockLease {
    /// The locked resource key (`lock:<kind>:<id>`).
    pub key: String,
    /// Random holder token.
    pub token: String,
}

// ============================================================================
// Cache envelope
// ============================================================================

/// A cache entry carrying an application-level expiry instead of a
/// store-level TTL.
///
/// A logically expired entry is still present in the store, so readers can
/// serve the stale payload while one of them refreshes in the background.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached payload.
    pub data: T,
    /// Logical expiry; the entry is stale, not gone, once this passes.
    pub expires_at: DateTime<Utc>,
}

impl<T: Serialize + DeserializeOwned> CacheEntry<T> {
    /// Wrap a payload with a logical expiry `ttl` from now.
    #[must_use]
    pub fn new(data: T, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        Self {
            data,
            expires_at: Utc::now() + ttl,
        }
    }

    /// Whether the entry is logically expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Encode the envelope for storage.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::Serialization`](crate::error::FlashSaleError)
    /// if the payload cannot be encoded.
    pub fn encode(&self) -> crate::error::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::error::FlashSaleError::Serialization(e.to_string()))
    }

    /// Decode an envelope read back from storage.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::Serialization`](crate::error::FlashSaleError)
    /// if the raw value is not a valid envelope.
    pub fn decode(raw: &str) -> crate::error::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| crate::error::FlashSaleError::Serialization(e.to_string()))
    }
}
