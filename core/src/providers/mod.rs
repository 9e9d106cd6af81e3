//! Provider traits for the external collaborators of the admission core.
//!
//! Each trait abstracts one protocol the core speaks: id generation, lease
//! locking, the atomic admission script, the consumer-group intake queue,
//! the durable store, and the cache store. Backend crates implement them
//! against real stores; the in-memory mocks implement them for tests.

mod admission;
mod cache;
mod id_generator;
mod lock;
mod queue;
mod store;

pub use admission::AdmissionGate;
pub use cache::{CacheStore, EntityLoader};
pub use id_generator::{
    IdGenerator, ID_EPOCH_SECONDS, ID_SEQUENCE_BITS, ID_SEQUENCE_MASK, compose_order_id,
    timestamp_of,
};
pub use lock::DistributedLock;
pub use queue::IntakeQueue;
pub use store::{OrderStore, VoucherStore};
