//! Error types for the flash-sale admission subsystem.

use thiserror::Error;

/// Result type alias for flash-sale operations.
pub type Result<T> = std::result::Result<T, FlashSaleError>;

/// Error taxonomy for the admission and cache-resilience core.
///
/// Contention outcomes (out of stock, duplicate admission, a busy lock, a
/// lost compare-and-set race) are *not* errors — they are typed results on
/// the operations that produce them. Everything here is an infrastructure
/// or programming failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlashSaleError {
    /// The shared key-value store failed (connection, command, or script).
    #[error("key-value store error: {0}")]
    KeyValueStore(String),

    /// The durable store failed (connection, query, or transaction).
    #[error("database error: {0}")]
    Database(String),

    /// A cache envelope or intake record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal invariant breach (should not be exposed to users).
    #[error("internal error: {0}")]
    Internal(String),
}

impl FlashSaleError {
    /// Returns `true` if retrying the whole request may succeed.
    ///
    /// Store and database failures are transient from the caller's point of
    /// view; serialization and internal failures are not.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flashsale_core::error::FlashSaleError;
    /// assert!(FlashSaleError::KeyValueStore("timeout".into()).is_transient());
    /// assert!(!FlashSaleError::Serialization("bad json".into()).is_transient());
    /// ```
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::KeyValueStore(_) | Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FlashSaleError::Database("connection reset".into()).is_transient());
        assert!(!FlashSaleError::Internal("mutex poisoned".into()).is_transient());
    }

    #[test]
    fn display_includes_detail() {
        let error = FlashSaleError::KeyValueStore("NOSCRIPT".into());
        assert_eq!(error.to_string(), "key-value store error: NOSCRIPT");
    }
}
