//! Redis-backed atomic admission gate.
//!
//! The whole fast path is one server-side Lua script: stock check,
//! one-per-user check, decrement, admitted-set insert, and the stream
//! append all execute as a single indivisible operation. No request thread
//! ever reads-then-writes the counter or the set.

use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::keys;
use flashsale_core::providers::AdmissionGate;
use flashsale_core::types::{Admission, OrderId, UserId, VoucherId};
use redis::Script;
use redis::aio::ConnectionManager;

/// KEYS: stock counter, admitted-set, intake stream.
/// ARGV: user id, voucher id, order id.
///
/// A missing counter reads as sold out, so a sale that was never opened
/// (or was retired) admits nobody.
const ADMIT_SCRIPT: &str = r"
local stock = tonumber(redis.call('get', KEYS[1]))
if stock == nil or stock <= 0 then
    return 1
end
if redis.call('sismember', KEYS[2], ARGV[1]) == 1 then
    return 2
end
redis.call('incrby', KEYS[1], -1)
redis.call('sadd', KEYS[2], ARGV[1])
redis.call('xadd', KEYS[3], '*', 'userId', ARGV[1], 'voucherId', ARGV[2], 'orderId', ARGV[3])
return 0
";

/// Redis-backed admission gate.
#[derive(Clone)]
pub struct RedisAdmissionGate {
    conn: ConnectionManager,
    admit: Script,
    stream: String,
}

impl RedisAdmissionGate {
    /// Create a gate appending intake records to `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::KeyValueStore`] if the connection fails.
    pub async fn new(redis_url: &str, stream: impl Into<String>) -> Result<Self> {
        Ok(Self::from_manager(crate::connect(redis_url).await?, stream))
    }

    /// Create a gate over a shared connection manager.
    pub fn from_manager(conn: ConnectionManager, stream: impl Into<String>) -> Self {
        Self {
            conn,
            admit: Script::new(ADMIT_SCRIPT),
            stream: stream.into(),
        }
    }
}

impl AdmissionGate for RedisAdmissionGate {
    async fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Admission> {
        let mut conn = self.conn.clone();

        let verdict: i64 = self
            .admit
            .key(keys::stock_key(voucher_id))
            .key(keys::admitted_key(voucher_id))
            .key(&self.stream)
            .arg(user_id.0)
            .arg(voucher_id.0)
            .arg(order_id.0)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                FlashSaleError::KeyValueStore(format!("admission script failed: {e}"))
            })?;

        match verdict {
            0 => Ok(Admission::Admitted),
            1 => Ok(Admission::OutOfStock),
            2 => Ok(Admission::AlreadyOrdered),
            other => Err(FlashSaleError::KeyValueStore(format!(
                "unexpected admission script result: {other}"
            ))),
        }
    }

    async fn seed_stock(&self, voucher_id: VoucherId, stock: i64) -> Result<()> {
        let mut conn = self.conn.clone();

        // Counter and admitted-set change together or not at all.
        let _: () = redis::pipe()
            .atomic()
            .set(keys::stock_key(voucher_id), stock)
            .ignore()
            .del(keys::admitted_key(voucher_id))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("failed to seed stock: {e}")))?;

        tracing::info!(voucher_id = %voucher_id, stock, "admission stock seeded");
        Ok(())
    }

    async fn retire(&self, voucher_id: VoucherId) -> Result<()> {
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .del(keys::stock_key(voucher_id))
            .ignore()
            .del(keys::admitted_key(voucher_id))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| FlashSaleError::KeyValueStore(format!("failed to retire sale: {e}")))?;

        tracing::info!(voucher_id = %voucher_id, "admission stock retired");
        Ok(())
    }
}
