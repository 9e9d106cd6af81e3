//! Key namespace shared by every provider backed by the key-value store.
//!
//! All providers and both halves of a deployment (request path and worker)
//! must agree on these; they are part of the wire contract, not an
//! implementation detail of any one store.

/// Cached stock counter for a voucher: `seckill:stock:<voucherId>`.
pub const STOCK_KEY_PREFIX: &str = "seckill:stock:";

/// Per-voucher set of already-admitted user ids: `seckill:order:<voucherId>`.
pub const ADMITTED_KEY_PREFIX: &str = "seckill:order:";

/// Default intake stream name.
pub const ORDER_STREAM: &str = "stream.orders";

/// Cached shop entities: `cache:shop:<shopId>`.
pub const SHOP_CACHE_PREFIX: &str = "cache:shop:";

/// Per-user materialization lock: `lock:order:<userId>`.
pub const ORDER_LOCK_PREFIX: &str = "lock:order:";

/// Per-shop cache rebuild lock: `lock:shop:<shopId>`.
pub const SHOP_LOCK_PREFIX: &str = "lock:shop:";

/// Daily sequence counters for the id generator: `icr:<scope>:<yyyy:MM:dd>`.
pub const ID_KEY_PREFIX: &str = "icr:";

/// Scope under which order ids are generated.
pub const ORDER_ID_SCOPE: &str = "order";

/// Null-result marker: "checked recently, does not exist".
///
/// Distinct from an absent key and from any JSON payload.
pub const NULL_MARKER: &str = "";

/// Intake record field carrying the order id.
pub const FIELD_ORDER_ID: &str = "orderId";

/// Intake record field carrying the user id.
pub const FIELD_USER_ID: &str = "userId";

/// Intake record field carrying the voucher id.
pub const FIELD_VOUCHER_ID: &str = "voucherId";

/// Build the stock counter key for a voucher.
#[must_use]
pub fn stock_key(voucher_id: crate::types::VoucherId) -> String {
    format!("{STOCK_KEY_PREFIX}{voucher_id}")
}

/// Build the admitted-set key for a voucher.
#[must_use]
pub fn admitted_key(voucher_id: crate::types::VoucherId) -> String {
    format!("{ADMITTED_KEY_PREFIX}{voucher_id}")
}

/// Build the per-user materialization lock key.
#[must_use]
pub fn order_lock_key(user_id: crate::types::UserId) -> String {
    format!("{ORDER_LOCK_PREFIX}{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{UserId, VoucherId};

    #[test]
    fn key_shapes() {
        assert_eq!(stock_key(VoucherId(10)), "seckill:stock:10");
        assert_eq!(admitted_key(VoucherId(10)), "seckill:order:10");
        assert_eq!(order_lock_key(UserId(5)), "lock:order:5");
    }
}
