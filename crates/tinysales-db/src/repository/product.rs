//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Not Here: Stock Mutations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  available_quantity is owned by the Stock Ledger.                   │
//! │                                                                     │
//! │  This repository sets the column exactly once, at INSERT time       │
//! │  (the product's opening stock). Every later movement - reserve,     │
//! │  release, restock - is a ledger delta. update() deliberately        │
//! │  excludes the column so a stale Product struct can never clobber    │
//! │  concurrent reservations.                                           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tinysales_core::Product;

const PRODUCT_COLUMNS: &str = r#"
    id,
    name,
    category_id,
    price_cents,
    available_quantity,
    is_active,
    created_at,
    updated_at
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found (active or not)
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets several products by ID in one round trip.
    ///
    /// Missing ids are simply absent from the result; the caller decides
    /// whether that is an error.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, Product>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Lists active products, sorted by name.
    ///
    /// ## Arguments
    /// * `limit` / `offset` - Pagination window
    /// * `category_id` - Optional category filter
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
        category_id: Option<&str>,
    ) -> DbResult<Vec<Product>> {
        let products = match category_id {
            Some(category_id) => {
                sqlx::query_as::<_, Product>(&format!(
                    r#"
                    SELECT {PRODUCT_COLUMNS} FROM products
                    WHERE is_active = 1 AND category_id = ?1
                    ORDER BY name
                    LIMIT ?2 OFFSET ?3
                    "#
                ))
                .bind(category_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Product>(&format!(
                    r#"
                    SELECT {PRODUCT_COLUMNS} FROM products
                    WHERE is_active = 1
                    ORDER BY name
                    LIMIT ?1 OFFSET ?2
                    "#
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// The only place `available_quantity` is written outside the Stock
    /// Ledger: it records the product's opening stock.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category_id,
                price_cents, available_quantity, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.available_quantity)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Updates a product's catalog details.
    ///
    /// Writes name, category, price and active flag. Does NOT write
    /// `available_quantity`; stock moves only through the ledger.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                category_id = ?3,
                price_cents = ?4,
                is_active = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// Historical order lines still reference this product by id; the
    /// row must survive for audit even when no longer orderable.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID (time-ordered UUID).
pub fn generate_product_id() -> String {
    Uuid::now_v7().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
