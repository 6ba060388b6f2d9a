//! # Stock Ledger
//!
//! Single source of truth for `available_quantity` per product.
//!
//! No other component reads-modifies-writes the quantity column: product
//! updates explicitly exclude it, and cancellation replenishment goes
//! through [`StockLedger::release_in`]. That keeps every stock movement
//! behind one interface with one invariant: **the column never goes
//! negative, not even transiently**.
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Reservation Strategy                             │
//! │                                                                     │
//! │  ❌ WRONG: read-check-write (racy between read and write)           │
//! │     SELECT available_quantity ...; if enough { UPDATE ... }         │
//! │                                                                     │
//! │  ✅ CORRECT: single guarded UPDATE (atomic compare-and-decrement)   │
//! │     UPDATE products                                                 │
//! │     SET available_quantity = available_quantity - ?qty              │
//! │     WHERE id = ?id AND available_quantity >= ?qty                   │
//! │                                                                     │
//! │  rows_affected == 1  → reserved                                     │
//! │  rows_affected == 0  → insufficient stock (or unknown product),     │
//! │                        state untouched                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The schema-level `CHECK (available_quantity >= 0)` is a second line
//! of defense behind the guard clause.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Result of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Quantity decremented; stock is committed to the caller.
    Reserved,
    /// Not enough stock; nothing changed. Carries the quantity that was
    /// available at the time of the attempt.
    Insufficient { available: i64 },
    /// No such product row; nothing changed.
    NotFound,
}

/// The stock ledger over the products table.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Atomically reserves `quantity` units of a product.
    ///
    /// Decrements `available_quantity` only if the resulting value stays
    /// `>= 0`; otherwise reports why and leaves state unchanged. No side
    /// effects on failure.
    ///
    /// ## Arguments
    /// * `product_id` - Product to reserve from
    /// * `quantity` - Units to reserve (must be positive)
    pub async fn reserve(&self, product_id: &str, quantity: i64) -> DbResult<ReserveOutcome> {
        debug!(product_id = %product_id, quantity = %quantity, "Reserving stock");

        if quantity <= 0 {
            return Err(DbError::QueryFailed(format!(
                "reserve quantity must be positive, got {}",
                quantity
            )));
        }

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                available_quantity = available_quantity - ?2,
                updated_at = ?3
            WHERE id = ?1 AND available_quantity >= ?2
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(ReserveOutcome::Reserved);
        }

        // The guard rejected: either the row is missing or stock is short.
        let available: Option<i64> =
            sqlx::query_scalar("SELECT available_quantity FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        match available {
            Some(available) => {
                debug!(product_id = %product_id, available = %available, requested = %quantity, "Reservation rejected");
                Ok(ReserveOutcome::Insufficient { available })
            }
            None => Ok(ReserveOutcome::NotFound),
        }
    }

    /// Releases `quantity` units back to a product.
    ///
    /// Unconditional increment; used for compensating rollback when a
    /// later step of order creation fails.
    pub async fn release(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        debug!(product_id = %product_id, quantity = %quantity, "Releasing stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                available_quantity = available_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Releases stock inside a caller-owned transaction.
    ///
    /// Used by cancellation so replenishment commits atomically with the
    /// order's status change: either both land or neither does.
    pub async fn release_in(
        tx: &mut Transaction<'_, Sqlite>,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(product_id = %product_id, quantity = %quantity, "Releasing stock (transactional)");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                available_quantity = available_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Point-in-time read of a product's available quantity.
    ///
    /// Not serializable with concurrent reserve/release unless the
    /// caller holds the product's coordinator lock.
    pub async fn query(&self, product_id: &str) -> DbResult<Option<i64>> {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT available_quantity FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(available)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
