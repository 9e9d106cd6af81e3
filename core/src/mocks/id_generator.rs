//! In-memory id generator for testing.

use crate::error::Result;
use crate::providers::{IdGenerator, ID_EPOCH_SECONDS, compose_order_id};
use crate::types::OrderId;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// In-memory id generator with the production bit layout.
///
/// The shared atomic stands in for the store-side counter; ids remain
/// unique across every clone of one instance.
#[derive(Clone, Default)]
pub struct MemoryIdGenerator {
    sequence: Arc<AtomicI64>,
}

impl MemoryIdGenerator {
    /// Create a generator starting at sequence zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for MemoryIdGenerator {
    async fn next_id(&self, _scope: &str) -> Result<OrderId> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = Utc::now().timestamp() - ID_EPOCH_SECONDS;
        Ok(compose_order_id(timestamp, sequence))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn ids_are_unique_and_non_decreasing() {
        let ids = MemoryIdGenerator::new();
        let mut seen = HashSet::new();
        let mut previous = OrderId(0);
        for _ in 0..1000 {
            let id = ids.next_id("order").await.unwrap();
            assert!(seen.insert(id), "duplicate id {id}");
            assert!(id >= previous);
            previous = id;
        }
    }
}
