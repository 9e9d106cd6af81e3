//! `PostgreSQL` order repository.

use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::providers::OrderStore;
use flashsale_core::types::{Order, OrderWrite, UserId, VoucherId};
use sqlx::PgPool;

/// `PostgreSQL`-backed order store.
///
/// Implements the materialization transaction: the compare-and-set stock
/// decrement and the order insert commit together or not at all.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Create an order store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for PostgresOrderStore {
    async fn count_orders(&self, user_id: UserId, voucher_id: VoucherId) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*)
            FROM orders
            WHERE user_id = $1 AND voucher_id = $2
            ",
        )
        .bind(user_id.0)
        .bind(voucher_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| FlashSaleError::Database(format!("failed to count orders: {e}")))?;

        #[allow(clippy::cast_sign_loss)] // COUNT(*) is never negative
        Ok(count as u64)
    }

    async fn create_order(&self, order: &Order) -> Result<OrderWrite> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FlashSaleError::Database(format!("failed to begin transaction: {e}")))?;

        let decremented = sqlx::query(
            r"
            UPDATE vouchers
            SET stock = stock - 1
            WHERE id = $1 AND stock > 0
            ",
        )
        .bind(order.voucher_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| FlashSaleError::Database(format!("failed to decrement stock: {e}")))?;

        if decremented.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| FlashSaleError::Database(format!("failed to rollback: {e}")))?;
            return Ok(OrderWrite::StockExhausted);
        }

        let inserted = sqlx::query(
            r"
            INSERT INTO orders (id, user_id, voucher_id, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(order.id.0)
        .bind(order.user_id.0)
        .bind(order.voucher_id.0)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit()
                    .await
                    .map_err(|e| FlashSaleError::Database(format!("failed to commit: {e}")))?;
                metrics::counter!("flashsale.orders.created").increment(1);
                Ok(OrderWrite::Created)
            }
            Err(e) => {
                // A racing worker finished the same (user, voucher) pair
                // between our count check and this insert.
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        tx.rollback().await.map_err(|e| {
                            FlashSaleError::Database(format!("failed to rollback: {e}"))
                        })?;
                        return Ok(OrderWrite::Duplicate);
                    }
                }
                Err(FlashSaleError::Database(format!(
                    "failed to insert order: {e}"
                )))
            }
        }
    }
}
