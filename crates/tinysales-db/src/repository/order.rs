//! # Order Repository
//!
//! Database operations for orders, their lines and their event trail.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Order Write Paths                             │
//! │                                                                     │
//! │  1. CREATE                                                          │
//! │     └── insert() → header + lines + initial event,                  │
//! │         one transaction, all-or-nothing                             │
//! │                                                                     │
//! │  2. TRANSITION                                                      │
//! │     └── caller opens a transaction, then:                           │
//! │         update_status_in() → guarded on the expected status         │
//! │         append_event_in()  → audit record                           │
//! │         (plus ledger releases for cancellations)                    │
//! │         commit                                                      │
//! │                                                                     │
//! │  Lines are immutable after creation: cancellation releases stock    │
//! │  but the recorded quantities stay for audit.                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tinysales_core::{Order, OrderEvent, OrderLine, OrderStatus};

// =============================================================================
// Filter
// =============================================================================

/// Listing filter for orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Restrict to one customer's orders.
    pub customer_id: Option<String>,
    /// Restrict to the given statuses (empty/None = all).
    pub statuses: Option<Vec<OrderStatus>>,
    /// Pagination window; a limit of 0 means the repository default (50).
    pub limit: i64,
    pub offset: i64,
}

// =============================================================================
// Row Types
// =============================================================================

/// Flat header row; lines and events are fetched separately and the
/// owning [`Order`] aggregate is assembled from all three.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    customer_id: String,
    contact_name: String,
    contact_email: String,
    delivery_address: String,
    status: OrderStatus,
    total_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a complete order: header, lines and initial events, in
    /// one transaction. Either everything lands or nothing does.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = %order.order_number, lines = order.lines.len(), "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id,
                contact_name, contact_email, delivery_address,
                status, total_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(&order.contact_name)
        .bind(&order.contact_email)
        .bind(&order.delivery_address)
        .bind(order.status)
        .bind(order.total_cents)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    id, order_id, product_id,
                    name_snapshot, quantity,
                    unit_price_cents, line_total_cents,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&line.id)
            .bind(&line.order_id)
            .bind(&line.product_id)
            .bind(&line.name_snapshot)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.line_total_cents)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for event in &order.events {
            Self::insert_event(&mut tx, event).await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Gets a full order (header + lines + events) by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT
                id, order_number, customer_id,
                contact_name, contact_email, delivery_address,
                status, total_cents,
                created_at, updated_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(self.assemble(row).await?))
    }

    /// Lists orders newest first.
    ///
    /// Non-admin callers pass their own `customer_id`; status filters
    /// are optional.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let limit = if filter.limit > 0 { filter.limit } else { 50 };

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                id, order_number, customer_id,
                contact_name, contact_email, delivery_address,
                status, total_cents,
                created_at, updated_at
            FROM orders
            WHERE 1 = 1
            "#,
        );

        if let Some(customer_id) = &filter.customer_id {
            builder.push(" AND customer_id = ");
            builder.push_bind(customer_id);
        }

        if let Some(statuses) = &filter.statuses {
            if !statuses.is_empty() {
                builder.push(" AND status IN (");
                let mut separated = builder.separated(", ");
                for status in statuses {
                    separated.push_bind(*status);
                }
                builder.push(")");
            }
        }

        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset);

        let rows: Vec<OrderRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.assemble(row).await?);
        }

        Ok(orders)
    }

    /// Reads an order's current status.
    pub async fn read_status(&self, id: &str) -> DbResult<Option<OrderStatus>> {
        let status: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(status)
    }

    /// Moves an order from an expected status to a new one, inside the
    /// caller's transaction.
    ///
    /// ## Returns
    /// `true` if the order was in `from` and is now `to`; `false` if the
    /// guard matched nothing (wrong status or unknown order). The guard
    /// makes the transition safe against racing writers even without the
    /// coordinator's lock.
    pub async fn update_status_in(
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(order_id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Appends an audit event inside the caller's transaction.
    pub async fn append_event_in(
        tx: &mut Transaction<'_, Sqlite>,
        event: &OrderEvent,
    ) -> DbResult<()> {
        Self::insert_event(tx, event).await
    }

    /// Allocates the next order number: `<year><seq:04>`, e.g.
    /// `20260001`, `20260002`, ... The sequence restarts each year.
    ///
    /// Read-then-format is racy on its own; the coordinator serializes
    /// calls with its allocation lock.
    pub async fn next_order_number(&self) -> DbResult<String> {
        let year = Utc::now().format("%Y").to_string();
        let prefix = format!("{}%", year);

        let last: Option<String> = sqlx::query_scalar(
            r#"
            SELECT order_number FROM orders
            WHERE order_number LIKE ?1
            ORDER BY order_number DESC
            LIMIT 1
            "#,
        )
        .bind(&prefix)
        .fetch_optional(&self.pool)
        .await?;

        let next_seq = last
            .as_deref()
            .and_then(|n| n.get(year.len()..))
            .and_then(|s| s.parse::<u32>().ok())
            .map(|seq| seq + 1)
            .unwrap_or(1);

        Ok(format!("{}{:04}", year, next_seq))
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn insert_event(tx: &mut Transaction<'_, Sqlite>, event: &OrderEvent) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_events (id, order_id, event_type, data, occurred_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&event.id)
        .bind(&event.order_id)
        .bind(&event.event_type)
        .bind(&event.data)
        .bind(event.occurred_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Attaches lines and events to a header row.
    async fn assemble(&self, row: OrderRow) -> DbResult<Order> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT
                id, order_id, product_id,
                name_snapshot, quantity,
                unit_price_cents, line_total_cents,
                created_at
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let events = sqlx::query_as::<_, OrderEvent>(
            r#"
            SELECT id, order_id, event_type, data, occurred_at
            FROM order_events
            WHERE order_id = ?1
            ORDER BY occurred_at, id
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            customer_id: row.customer_id,
            contact_name: row.contact_name,
            contact_email: row.contact_email,
            delivery_address: row.delivery_address,
            status: row.status,
            total_cents: row.total_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
            lines,
            events,
        })
    }
}

/// Helper to generate a new order ID (time-ordered UUID).
pub fn generate_order_id() -> String {
    Uuid::now_v7().to_string()
}

/// Helper to generate a new order line ID.
pub fn generate_line_id() -> String {
    Uuid::now_v7().to_string()
}

/// Helper to generate a new order event ID.
pub fn generate_event_id() -> String {
    Uuid::now_v7().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tinysales_core::EVENT_ORDER_PLACED;

    fn sample_order(customer_id: &str, order_number: &str) -> Order {
        let now = Utc::now();
        let order_id = generate_order_id();

        let line = OrderLine {
            id: generate_line_id(),
            order_id: order_id.clone(),
            product_id: "prod-1".to_string(),
            name_snapshot: "Widget".to_string(),
            quantity: 2,
            unit_price_cents: 500,
            line_total_cents: 1000,
            created_at: now,
        };

        let event = OrderEvent {
            id: generate_event_id(),
            order_id: order_id.clone(),
            event_type: EVENT_ORDER_PLACED.to_string(),
            data: Some(r#"{"message":"Order created successfully."}"#.to_string()),
            occurred_at: now,
        };

        Order {
            id: order_id,
            order_number: order_number.to_string(),
            customer_id: customer_id.to_string(),
            contact_name: "Alice".to_string(),
            contact_email: "alice@example.com".to_string(),
            delivery_address: "1 Main St".to_string(),
            status: OrderStatus::Pending,
            total_cents: 1000,
            created_at: now,
            updated_at: now,
            lines: vec![line],
            events: vec![event],
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();

        let order = sample_order("alice", "20260001");
        repo.insert(&order).await.unwrap();

        let found = repo.get(&order.id).await.unwrap().unwrap();
        assert_eq!(found.order_number, "20260001");
        assert_eq!(found.status, OrderStatus::Pending);
        assert_eq!(found.total_cents, 1000);
        assert_eq!(found.lines.len(), 1);
        assert_eq!(found.lines[0].quantity, 2);
        assert_eq!(found.lines[0].unit_price_cents, 500);
        assert_eq!(found.events.len(), 1);
        assert_eq!(found.events[0].event_type, EVENT_ORDER_PLACED);

        assert!(repo.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guarded_status_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();

        let order = sample_order("alice", "20260001");
        repo.insert(&order).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let moved =
            OrderRepository::update_status_in(&mut tx, &order.id, OrderStatus::Pending, OrderStatus::Fulfilled)
                .await
                .unwrap();
        tx.commit().await.unwrap();
        assert!(moved);
        assert_eq!(
            repo.read_status(&order.id).await.unwrap(),
            Some(OrderStatus::Fulfilled)
        );

        // Second attempt finds the guard closed.
        let mut tx = db.pool().begin().await.unwrap();
        let moved =
            OrderRepository::update_status_in(&mut tx, &order.id, OrderStatus::Pending, OrderStatus::Cancelled)
                .await
                .unwrap();
        tx.rollback().await.unwrap();
        assert!(!moved);
        assert_eq!(
            repo.read_status(&order.id).await.unwrap(),
            Some(OrderStatus::Fulfilled)
        );
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();

        repo.insert(&sample_order("alice", "20260001")).await.unwrap();
        repo.insert(&sample_order("alice", "20260002")).await.unwrap();
        repo.insert(&sample_order("bob", "20260003")).await.unwrap();

        let all = repo.list(&OrderFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let alices = repo
            .list(&OrderFilter {
                customer_id: Some("alice".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(alices.len(), 2);

        let cancelled = repo
            .list(&OrderFilter {
                statuses: Some(vec![OrderStatus::Cancelled]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(cancelled.is_empty());
    }

    #[tokio::test]
    async fn test_next_order_number_sequence() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();

        let first = repo.next_order_number().await.unwrap();
        let year = Utc::now().format("%Y").to_string();
        assert_eq!(first, format!("{}0001", year));

        repo.insert(&sample_order("alice", &first)).await.unwrap();

        let second = repo.next_order_number().await.unwrap();
        assert_eq!(second, format!("{}0002", year));
    }
}
