//! `PostgreSQL` voucher repository.

use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::providers::VoucherStore;
use flashsale_core::types::{Voucher, VoucherId};
use sqlx::{PgPool, Row};

/// `PostgreSQL`-backed voucher store.
///
/// Reads feed the admission gate's warm-up (`open_sale` seeds the cached
/// counter from the durable stock read here); writes happen at voucher
/// publication time, outside the hot path.
#[derive(Clone)]
pub struct PostgresVoucherStore {
    pool: PgPool,
}

impl PostgresVoucherStore {
    /// Create a voucher store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl VoucherStore for PostgresVoucherStore {
    async fn create_voucher(&self, voucher: &Voucher) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO vouchers (id, stock, begin_at, end_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(voucher.id.0)
        .bind(voucher.stock)
        .bind(voucher.begin_at)
        .bind(voucher.end_at)
        .execute(&self.pool)
        .await
        .map_err(|e| FlashSaleError::Database(format!("failed to create voucher: {e}")))?;

        tracing::info!(voucher_id = %voucher.id, stock = voucher.stock, "voucher created");
        Ok(())
    }

    async fn get_voucher(&self, voucher_id: VoucherId) -> Result<Option<Voucher>> {
        let row = sqlx::query(
            r"
            SELECT id, stock, begin_at, end_at
            FROM vouchers
            WHERE id = $1
            ",
        )
        .bind(voucher_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FlashSaleError::Database(format!("failed to get voucher: {e}")))?;

        Ok(row.map(|row| Voucher {
            id: VoucherId(row.get("id")),
            stock: row.get("stock"),
            begin_at: row.get("begin_at"),
            end_at: row.get("end_at"),
        }))
    }
}
