//! # FlashSale Core
//!
//! Order-admission and cache-resilience core for a flash-sale voucher
//! feature: many clients race to buy a small, finite stock, each user may
//! buy at most one unit, and the hot read path must survive cache misses
//! without collapsing the durable store.
//!
//! ## Architecture
//!
//! ```text
//! request ──▶ AdmissionService ──▶ AdmissionGate (one atomic script)
//!                   │                    │ on success
//!                   ▼                    ▼
//!             order id returned    IntakeQueue (consumer group)
//!                                        │
//!                                        ▼
//!                              OrderMaterializer (per-user lock)
//!                                        │
//!                                        ▼
//!                            OrderStore (CAS decrement + insert)
//!
//! read ──▶ ResilientCache ──▶ CacheStore ──miss/stale──▶ EntityLoader
//! ```
//!
//! All buyer-facing contention resolves inside the gate's single store
//! operation; the durable write is decoupled behind the queue, which
//! guarantees at-least-once delivery, made safe by idempotent
//! materialization.
//!
//! Backends implement the [`providers`] traits: `flashsale-redis` for the
//! key-value side (gate script, lease locks, stream queue, cache store,
//! id sequences) and `flashsale-postgres` for the durable side. The
//! [`mocks`] module ships in-memory providers that preserve the same
//! atomicity semantics for tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod materializer;
pub mod providers;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use admission::AdmissionService;
pub use cache::{CacheConfig, ResilientCache};
pub use error::{FlashSaleError, Result};
pub use materializer::{MaterializerConfig, OrderMaterializer};
pub use types::{
    Admission, AdmissionOutcome, IntakeDelivery, IntakeRecord, LockLease, Order, OrderId,
    OrderWrite, Shop, UserId, Voucher, VoucherId,
};
