//! `PostgreSQL` shop repository, the durable side of the resilient cache.

use flashsale_core::error::{FlashSaleError, Result};
use flashsale_core::providers::EntityLoader;
use flashsale_core::types::Shop;
use sqlx::{PgPool, Row};

/// `PostgreSQL`-backed shop store.
///
/// `load` is the durable read behind the cache layer. After
/// [`update_shop`] the caller must invalidate the cached copy
/// (`ResilientCache::invalidate`) so the next read re-loads.
///
/// [`update_shop`]: PostgresShopStore::update_shop
#[derive(Clone)]
pub struct PostgresShopStore {
    pool: PgPool,
}

impl PostgresShopStore {
    /// Create a shop store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a shop row.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::Database`] if the write fails.
    pub async fn upsert_shop(&self, shop: &Shop) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO shops (id, name, address, score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                address = EXCLUDED.address,
                score = EXCLUDED.score
            ",
        )
        .bind(shop.id)
        .bind(&shop.name)
        .bind(&shop.address)
        .bind(shop.score)
        .execute(&self.pool)
        .await
        .map_err(|e| FlashSaleError::Database(format!("failed to upsert shop: {e}")))?;
        Ok(())
    }

    /// Update an existing shop row.
    ///
    /// Returns `false` when no row matched the id. Pair with a cache
    /// invalidation so readers do not keep serving the old version for a
    /// full TTL.
    ///
    /// # Errors
    ///
    /// Returns [`FlashSaleError::Database`] if the write fails.
    pub async fn update_shop(&self, shop: &Shop) -> Result<bool> {
        let updated = sqlx::query(
            r"
            UPDATE shops
            SET name = $2, address = $3, score = $4
            WHERE id = $1
            ",
        )
        .bind(shop.id)
        .bind(&shop.name)
        .bind(&shop.address)
        .bind(shop.score)
        .execute(&self.pool)
        .await
        .map_err(|e| FlashSaleError::Database(format!("failed to update shop: {e}")))?;

        Ok(updated.rows_affected() > 0)
    }
}

impl EntityLoader for PostgresShopStore {
    type Entity = Shop;

    async fn load(&self, id: i64) -> Result<Option<Shop>> {
        let row = sqlx::query(
            r"
            SELECT id, name, address, score
            FROM shops
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FlashSaleError::Database(format!("failed to load shop: {e}")))?;

        Ok(row.map(|row| Shop {
            id: row.get("id"),
            name: row.get("name"),
            address: row.get("address"),
            score: row.get("score"),
        }))
    }
}
