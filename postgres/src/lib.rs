//! # FlashSale Postgres
//!
//! `PostgreSQL` durable store for the flash-sale admission core: vouchers,
//! orders, and the hot shop records behind the resilient cache.
//!
//! The stock invariant lives here: durable stock is only ever decremented
//! by a compare-and-set `UPDATE ... WHERE stock > 0`, committed in the
//! same transaction as the order insert, and `(user_id, voucher_id)`
//! uniqueness is enforced by a constraint rather than application code.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod orders;
pub mod shops;
pub mod vouchers;

pub use orders::PostgresOrderStore;
pub use shops::PostgresShopStore;
pub use vouchers::PostgresVoucherStore;

use flashsale_core::config::PostgresConfig;
use flashsale_core::error::{FlashSaleError, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Open a connection pool to the durable store.
///
/// # Errors
///
/// Returns [`FlashSaleError::Database`] if the pool cannot be created.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .connect(&config.url)
        .await
        .map_err(|e| FlashSaleError::Database(format!("failed to connect: {e}")))
}

/// Run embedded database migrations.
///
/// # Errors
///
/// Returns [`FlashSaleError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| FlashSaleError::Database(format!("migration failed: {e}")))?;
    Ok(())
}
