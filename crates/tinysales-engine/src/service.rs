//! # Order Engine
//!
//! The Consistency Coordinator: every order/stock mutation flows through
//! here so that concurrent requests touching the same products or the
//! same order serialize cleanly.
//!
//! ## Order Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  create_order: All-or-Nothing                       │
//! │                                                                     │
//! │  1. lock products referenced by the request (ascending id)          │
//! │  2. fetch product rows                                              │
//! │  3. build_order() - pure validation + price/name snapshots          │
//! │  4. reserve(product, qty) per line                                  │
//! │       └── any failure: release() every prior reservation,           │
//! │           surface the original error, nothing persisted             │
//! │  5. persist header + lines + order_placed event (one tx)            │
//! │       └── failure: release() every reservation, surface error       │
//! │                                                                     │
//! │  Result: an order is either fully reserved and persisted,           │
//! │  or it never existed.                                               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transitions
//! Cancellation takes the same sorted product locks as creation, then
//! the order lock, re-reads status and applies the state machine. The
//! status flip, stock releases and audit event commit in a single
//! transaction: a failure at any point rolls all of it back.

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use tinysales_core::{
    build_order, lifecycle, validation, CoreError, Identity, Order, OrderAction, OrderDraft,
    OrderEvent, OrderLine, OrderRequest, OrderStatus, Product, Role, StockEffect,
    Category, EVENT_ORDER_CANCELLED, EVENT_ORDER_FULFILLED, EVENT_ORDER_PLACED,
};
use tinysales_db::repository::category::generate_category_id;
use tinysales_db::repository::order::{generate_event_id, generate_line_id, generate_order_id};
use tinysales_db::repository::product::generate_product_id;
use tinysales_db::{
    Database, DbError, OrderFilter, OrderRepository, ReserveOutcome, StockLedger,
};

use crate::config::{EngineConfig, ReplenishPolicy};
use crate::error::{EngineError, EngineResult};
use crate::locks::LockRegistry;

// =============================================================================
// Input Types
// =============================================================================

/// Input for product creation.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category_id: Option<String>,
    pub price_cents: i64,
    /// Opening stock. Later adjustments go through [`OrderEngine::restock`].
    pub initial_quantity: i64,
}

/// Partial update for a product's catalog details.
///
/// `None` leaves a field unchanged. For the category, `Some(None)`
/// clears it and `Some(Some(id))` reassigns it. Stock is deliberately
/// absent: quantities only move through the ledger.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<Option<String>>,
}

/// Input for category creation.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

// =============================================================================
// Engine
// =============================================================================

/// The Consistency Coordinator and service surface of Tiny Sales.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./tinysales.db")).await?;
/// let engine = OrderEngine::new(db, EngineConfig::load()?);
///
/// let order = engine.create_order(&identity, request).await?;
/// engine.transition_order(&identity, &order.id, OrderAction::Cancel).await?;
/// ```
#[derive(Debug)]
pub struct OrderEngine {
    db: Database,
    ledger: StockLedger,
    locks: LockRegistry,
    /// Serializes order-number allocation (read-max + insert).
    order_seq: AsyncMutex<()>,
    config: EngineConfig,
}

impl OrderEngine {
    /// Creates a new engine over a connected database.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let ledger = db.ledger();
        OrderEngine {
            db,
            ledger,
            locks: LockRegistry::new(),
            order_seq: AsyncMutex::new(()),
            config,
        }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Creates an order for the calling customer.
    ///
    /// Validates the request, reserves stock for every line and persists
    /// the order in `pending` state. All-or-nothing: on any failure every
    /// reservation made by this call is released and no order exists.
    pub async fn create_order(
        &self,
        identity: &Identity,
        request: OrderRequest,
    ) -> EngineResult<Order> {
        debug!(customer_id = %identity.user_id, lines = request.lines.len(), "create_order");

        if request.lines.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }

        let mut product_ids: Vec<String> =
            request.lines.iter().map(|l| l.product_id.clone()).collect();
        product_ids.sort();
        product_ids.dedup();

        // Everything from validation to persistence happens inside the
        // product locks: the snapshot, the reservations and the stored
        // order can never disagree.
        let _product_guards = self.locks.lock_products(&product_ids).await;

        let products = self.db.products().get_many(&product_ids).await?;
        let draft = build_order(&request, &products)?;

        // Reserve each line, keeping track of what must be undone.
        let mut reserved: Vec<(String, i64)> = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            match self.ledger.reserve(&line.product_id, line.quantity).await {
                Ok(ReserveOutcome::Reserved) => {
                    reserved.push((line.product_id.clone(), line.quantity));
                }
                Ok(ReserveOutcome::Insufficient { available }) => {
                    self.release_reserved(&reserved).await;
                    return Err(CoreError::InsufficientStock {
                        product_id: line.product_id.clone(),
                        available,
                        requested: line.quantity,
                    }
                    .into());
                }
                Ok(ReserveOutcome::NotFound) => {
                    self.release_reserved(&reserved).await;
                    return Err(CoreError::ProductNotFound(line.product_id.clone()).into());
                }
                Err(err) => {
                    self.release_reserved(&reserved).await;
                    return Err(err.into());
                }
            }
        }

        // Reservations are in; if persistence fails they must come back out.
        let order = match self.persist_new_order(identity, draft).await {
            Ok(order) => order,
            Err(err) => {
                self.release_reserved(&reserved).await;
                return Err(err);
            }
        };

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total_cents = order.total_cents,
            lines = order.lines.len(),
            "Order created"
        );

        Ok(order)
    }

    /// Applies a lifecycle action (fulfill/cancel) to an order.
    ///
    /// Fulfillment is admin-only; cancellation is allowed for the owner
    /// or an admin. Cancellation replenishes stock according to the
    /// configured [`ReplenishPolicy`].
    pub async fn transition_order(
        &self,
        identity: &Identity,
        order_id: &str,
        action: OrderAction,
    ) -> EngineResult<Order> {
        debug!(order_id = %order_id, action = action.as_str(), "transition_order");

        let orders = self.db.orders();
        let order = orders
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        self.authorize_transition(identity, &order, action)?;

        // Lock protocol: sorted product locks first (cancel only - it is
        // the action that moves stock), then the order lock. Same global
        // ordering as creation, so overlapping requests cannot deadlock.
        // Lines are immutable, so collecting product ids pre-lock is safe.
        let _product_guards = match action {
            OrderAction::Cancel => {
                let ids: Vec<String> =
                    order.lines.iter().map(|l| l.product_id.clone()).collect();
                Some(self.locks.lock_products(&ids).await)
            }
            OrderAction::Fulfill => None,
        };
        let _order_guard = self.locks.lock_order(order_id).await;

        // Re-read under the lock; a concurrent transition may have won
        // between our fetch and here.
        let status = orders
            .read_status(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let transition = match lifecycle::transition(order_id, status, action) {
            Ok(t) => t,
            Err(err) => {
                warn!(order_id = %order_id, status = ?status, action = action.as_str(), "Transition rejected");
                return Err(err.into());
            }
        };

        let replenish = transition.effect == StockEffect::ReleaseAll
            && self.config.replenish_on_cancel == ReplenishPolicy::Always;

        // Status flip, stock releases and the audit event commit
        // together; an error at any point rolls the whole step back.
        let mut tx = self.db.pool().begin().await?;

        let moved =
            OrderRepository::update_status_in(&mut tx, order_id, status, transition.next).await?;
        if !moved {
            // With the order lock held this means a writer outside the
            // engine changed the row; treat it as a lost race.
            tx.rollback().await?;
            let status = orders
                .read_status(order_id)
                .await?
                .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
            return Err(CoreError::InvalidTransition {
                order_id: order_id.to_string(),
                status,
                action: action.as_str().to_string(),
            }
            .into());
        }

        if replenish {
            for line in &order.lines {
                StockLedger::release_in(&mut tx, &line.product_id, line.quantity).await?;
            }
        }

        let event = match action {
            OrderAction::Fulfill => OrderEvent {
                id: generate_event_id(),
                order_id: order_id.to_string(),
                event_type: EVENT_ORDER_FULFILLED.to_string(),
                data: Some(json!({ "message": "Order marked as fulfilled." }).to_string()),
                occurred_at: Utc::now(),
            },
            OrderAction::Cancel => OrderEvent {
                id: generate_event_id(),
                order_id: order_id.to_string(),
                event_type: EVENT_ORDER_CANCELLED.to_string(),
                data: Some(
                    json!({
                        "message": "Order cancelled.",
                        "stock_replenished": replenish,
                    })
                    .to_string(),
                ),
                occurred_at: Utc::now(),
            },
        };
        OrderRepository::append_event_in(&mut tx, &event).await?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            from = ?status,
            to = ?transition.next,
            stock_replenished = replenish,
            "Order transitioned"
        );

        let updated = orders
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        Ok(updated)
    }

    /// Fetches one order. Customers see only their own.
    pub async fn get_order(&self, identity: &Identity, order_id: &str) -> EngineResult<Order> {
        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        if !identity.can_access_order(&order) {
            return Err(EngineError::NotAuthorized(format!(
                "order {} belongs to another customer",
                order_id
            )));
        }

        Ok(order)
    }

    /// Lists orders newest first. Customers are scoped to their own
    /// orders; admins see everything.
    pub async fn list_orders(
        &self,
        identity: &Identity,
        statuses: Option<Vec<OrderStatus>>,
        limit: i64,
        offset: i64,
    ) -> EngineResult<Vec<Order>> {
        let customer_id = match identity.role {
            Role::Admin => None,
            Role::Customer => Some(identity.user_id.clone()),
        };

        let orders = self
            .db
            .orders()
            .list(&OrderFilter {
                customer_id,
                statuses,
                limit,
                offset,
            })
            .await?;

        Ok(orders)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Point-in-time read of a product's available quantity.
    pub async fn query_stock(&self, product_id: &str) -> EngineResult<i64> {
        self.ledger
            .query(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }

    /// Adds stock to a product (admin). Goes through the ledger like
    /// every other quantity movement; returns the new quantity.
    pub async fn restock(
        &self,
        identity: &Identity,
        product_id: &str,
        quantity: i64,
    ) -> EngineResult<i64> {
        self.require_admin(identity)?;
        validation::validate_quantity(quantity).map_err(CoreError::from)?;

        let ids = vec![product_id.to_string()];
        let _guards = self.locks.lock_products(&ids).await;

        match self.ledger.release(product_id, quantity).await {
            Ok(()) => {}
            Err(DbError::NotFound { .. }) => {
                return Err(CoreError::ProductNotFound(product_id.to_string()).into())
            }
            Err(err) => return Err(err.into()),
        }

        info!(product_id = %product_id, quantity = %quantity, "Stock added");

        self.query_stock(product_id).await
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product (admin).
    pub async fn create_product(
        &self,
        identity: &Identity,
        input: NewProduct,
    ) -> EngineResult<Product> {
        self.require_admin(identity)?;

        validation::validate_product_name(&input.name).map_err(CoreError::from)?;
        validation::validate_price_cents(input.price_cents).map_err(CoreError::from)?;
        if input.initial_quantity < 0 {
            return Err(CoreError::InvalidQuantity {
                quantity: input.initial_quantity,
            }
            .into());
        }

        if let Some(category_id) = &input.category_id {
            self.require_category(category_id).await?;
        }

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: input.name.trim().to_string(),
            category_id: input.category_id,
            price_cents: input.price_cents,
            available_quantity: input.initial_quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let product = self.db.products().insert(&product).await?;
        info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Updates a product's catalog details (admin). Stock is untouched.
    pub async fn update_product(
        &self,
        identity: &Identity,
        product_id: &str,
        update: ProductUpdate,
    ) -> EngineResult<Product> {
        self.require_admin(identity)?;

        let mut product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if let Some(name) = update.name {
            validation::validate_product_name(&name).map_err(CoreError::from)?;
            product.name = name.trim().to_string();
        }
        if let Some(price_cents) = update.price_cents {
            validation::validate_price_cents(price_cents).map_err(CoreError::from)?;
            product.price_cents = price_cents;
        }
        if let Some(category_id) = update.category_id {
            if let Some(category_id) = &category_id {
                self.require_category(category_id).await?;
            }
            product.category_id = category_id;
        }

        self.db.products().update(&product).await?;

        // Re-read: update() does not write stock, so the struct's
        // quantity may be stale by now.
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        Ok(product)
    }

    /// Soft-deletes a product (admin). Existing orders keep their lines;
    /// new orders referencing it are rejected as `ProductUnavailable`.
    pub async fn deactivate_product(
        &self,
        identity: &Identity,
        product_id: &str,
    ) -> EngineResult<()> {
        self.require_admin(identity)?;

        match self.db.products().deactivate(product_id).await {
            Ok(()) => {
                info!(product_id = %product_id, "Product deactivated");
                Ok(())
            }
            Err(DbError::NotFound { .. }) => {
                Err(CoreError::ProductNotFound(product_id.to_string()).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetches one product by id (active or not).
    pub async fn get_product(&self, product_id: &str) -> EngineResult<Product> {
        self.db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }

    /// Lists active products, optionally scoped to a category.
    pub async fn list_products(
        &self,
        limit: i64,
        offset: i64,
        category_id: Option<&str>,
    ) -> EngineResult<Vec<Product>> {
        if let Some(category_id) = category_id {
            self.require_category(category_id).await?;
        }
        Ok(self.db.products().list(limit, offset, category_id).await?)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Creates a category (admin).
    pub async fn create_category(
        &self,
        identity: &Identity,
        input: NewCategory,
    ) -> EngineResult<Category> {
        self.require_admin(identity)?;
        validation::validate_category_name(&input.name).map_err(CoreError::from)?;

        let now = Utc::now();
        let category = Category {
            id: generate_category_id(),
            name: input.name.trim().to_string(),
            description: input.description,
            created_at: now,
            updated_at: now,
        };

        let category = self.db.categories().insert(&category).await?;
        info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Lists all categories.
    pub async fn list_categories(&self) -> EngineResult<Vec<Category>> {
        Ok(self.db.categories().list().await?)
    }

    /// Deletes a category (admin). Products fall back to no category.
    pub async fn delete_category(&self, identity: &Identity, category_id: &str) -> EngineResult<()> {
        self.require_admin(identity)?;

        match self.db.categories().delete(category_id).await {
            Ok(()) => Ok(()),
            Err(DbError::NotFound { .. }) => {
                Err(EngineError::CategoryNotFound(category_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Persists a validated draft: allocates the order number and writes
    /// header + lines + initial event in one transaction.
    async fn persist_new_order(
        &self,
        identity: &Identity,
        draft: OrderDraft,
    ) -> EngineResult<Order> {
        let orders = self.db.orders();

        // next_order_number() is read-then-format; hold the allocation
        // lock until the insert lands.
        let _seq_guard = self.order_seq.lock().await;

        let order_number = orders.next_order_number().await?;
        let order_id = generate_order_id();
        let now = Utc::now();

        let lines: Vec<OrderLine> = draft
            .lines
            .into_iter()
            .map(|line| OrderLine {
                id: generate_line_id(),
                order_id: order_id.clone(),
                product_id: line.product_id,
                name_snapshot: line.name_snapshot,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                line_total_cents: line.line_total_cents,
                created_at: now,
            })
            .collect();

        let event = OrderEvent {
            id: generate_event_id(),
            order_id: order_id.clone(),
            event_type: EVENT_ORDER_PLACED.to_string(),
            data: Some(json!({ "message": "Order created successfully." }).to_string()),
            occurred_at: now,
        };

        let order = Order {
            id: order_id,
            order_number,
            customer_id: identity.user_id.clone(),
            contact_name: draft.contact_name,
            contact_email: draft.contact_email,
            delivery_address: draft.delivery_address,
            status: OrderStatus::Pending,
            total_cents: draft.total_cents,
            created_at: now,
            updated_at: now,
            lines,
            events: vec![event],
        };

        orders.insert(&order).await?;
        Ok(order)
    }

    /// Compensating rollback: returns every listed reservation.
    ///
    /// Failures here mean the store is unreachable; the error is logged
    /// and the remaining releases are still attempted so a transient
    /// fault leaks as little stock as possible.
    async fn release_reserved(&self, reserved: &[(String, i64)]) {
        for (product_id, quantity) in reserved {
            if let Err(err) = self.ledger.release(product_id, *quantity).await {
                error!(
                    product_id = %product_id,
                    quantity = %quantity,
                    error = %err,
                    "Failed to roll back reservation"
                );
            }
        }
    }

    fn authorize_transition(
        &self,
        identity: &Identity,
        order: &Order,
        action: OrderAction,
    ) -> EngineResult<()> {
        match action {
            OrderAction::Fulfill => {
                if identity.role != Role::Admin {
                    return Err(EngineError::NotAuthorized(
                        "fulfillment requires the admin role".to_string(),
                    ));
                }
            }
            OrderAction::Cancel => {
                if !identity.can_access_order(order) {
                    return Err(EngineError::NotAuthorized(format!(
                        "order {} belongs to another customer",
                        order.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn require_admin(&self, identity: &Identity) -> EngineResult<()> {
        if identity.role != Role::Admin {
            return Err(EngineError::NotAuthorized(
                "admin role required".to_string(),
            ));
        }
        Ok(())
    }

    async fn require_category(&self, category_id: &str) -> EngineResult<()> {
        self.db
            .categories()
            .get_by_id(category_id)
            .await?
            .ok_or_else(|| EngineError::CategoryNotFound(category_id.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tinysales_core::LineRequest;
    use tinysales_db::DbConfig;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .try_init();
    }

    async fn setup() -> OrderEngine {
        setup_with(EngineConfig::default()).await
    }

    async fn setup_with(config: EngineConfig) -> OrderEngine {
        init_logging();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        OrderEngine::new(db, config)
    }

    fn admin() -> Identity {
        Identity::admin("ops")
    }

    fn alice() -> Identity {
        Identity::customer("alice")
    }

    fn bob() -> Identity {
        Identity::customer("bob")
    }

    async fn add_product(engine: &OrderEngine, name: &str, price_cents: i64, qty: i64) -> Product {
        engine
            .create_product(
                &admin(),
                NewProduct {
                    name: name.to_string(),
                    category_id: None,
                    price_cents,
                    initial_quantity: qty,
                },
            )
            .await
            .unwrap()
    }

    fn order_request(lines: &[(&Product, i64)]) -> OrderRequest {
        OrderRequest {
            contact_name: "Test Customer".to_string(),
            contact_email: "customer@example.com".to_string(),
            delivery_address: "1 Main St, Springfield".to_string(),
            lines: lines
                .iter()
                .map(|(product, quantity)| LineRequest {
                    product_id: product.id.clone(),
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_order_reserves_and_persists() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 1050, 5).await;
        let p2 = add_product(&engine, "Gadget", 2500, 2).await;

        let order = engine
            .create_order(&alice(), order_request(&[(&p1, 3), (&p2, 2)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.customer_id, "alice");
        assert_eq!(order.total_cents, 3 * 1050 + 2 * 2500);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.events.len(), 1);
        assert_eq!(order.events[0].event_type, EVENT_ORDER_PLACED);

        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 2);
        assert_eq!(engine.query_stock(&p2.id).await.unwrap(), 0);

        let year = Utc::now().format("%Y").to_string();
        assert_eq!(order.order_number, format!("{}0001", year));
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 1050, 5).await;
        let p2 = add_product(&engine, "Gadget", 2500, 1).await;

        let err = engine
            .create_order(&alice(), order_request(&[(&p1, 3), (&p2, 2)]))
            .await
            .unwrap_err();

        match err {
            EngineError::Core(CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            }) => {
                assert_eq!(product_id, p2.id);
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }

        // The partial reservation on p1 was rolled back.
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 5);
        assert_eq!(engine.query_stock(&p2.id).await.unwrap(), 1);

        // And no order was persisted.
        let orders = engine.list_orders(&admin(), None, 10, 0).await.unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_rejections() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 1050, 5).await;

        // Empty order
        let err = engine
            .create_order(&alice(), order_request(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::EmptyOrder)));

        // Non-positive quantity
        let err = engine
            .create_order(&alice(), order_request(&[(&p1, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidQuantity { quantity: 0 })
        ));

        // Unknown product
        let mut request = order_request(&[(&p1, 1)]);
        request.lines[0].product_id = "ghost".to_string();
        let err = engine.create_order(&alice(), request).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::ProductNotFound(_))
        ));

        // Deactivated product
        engine.deactivate_product(&admin(), &p1.id).await.unwrap();
        let err = engine
            .create_order(&alice(), order_request(&[(&p1, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::ProductUnavailable(_))
        ));

        // Nothing was reserved by any rejected attempt.
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 5);
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cancel_restores_stock_exactly_once() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 1050, 5).await;
        let p2 = add_product(&engine, "Gadget", 2500, 2).await;

        let order = engine
            .create_order(&alice(), order_request(&[(&p1, 3), (&p2, 2)]))
            .await
            .unwrap();
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 2);

        let cancelled = engine
            .transition_order(&alice(), &order.id, OrderAction::Cancel)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 5);
        assert_eq!(engine.query_stock(&p2.id).await.unwrap(), 2);

        // The line records keep what was originally ordered.
        assert_eq!(cancelled.lines[0].quantity, 3);
        let last_event = cancelled.events.last().unwrap();
        assert_eq!(last_event.event_type, EVENT_ORDER_CANCELLED);
        assert!(last_event
            .data
            .as_deref()
            .unwrap()
            .contains("\"stock_replenished\":true"));

        // Second cancel is rejected and must not double-restore.
        let err = engine
            .transition_order(&alice(), &order.id, OrderAction::Cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition {
                status: OrderStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 5);
        assert_eq!(engine.query_stock(&p2.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fulfill_leaves_stock_unchanged() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 1050, 5).await;

        let order = engine
            .create_order(&alice(), order_request(&[(&p1, 3)]))
            .await
            .unwrap();

        let fulfilled = engine
            .transition_order(&admin(), &order.id, OrderAction::Fulfill)
            .await
            .unwrap();
        assert_eq!(fulfilled.status, OrderStatus::Fulfilled);
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 2);
        assert_eq!(
            fulfilled.events.last().unwrap().event_type,
            EVENT_ORDER_FULFILLED
        );

        // Terminal: cancelling a fulfilled order is rejected, stock untouched.
        let err = engine
            .transition_order(&admin(), &order.id, OrderAction::Cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition {
                status: OrderStatus::Fulfilled,
                ..
            })
        ));
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fulfill_after_cancel_rejected() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 1050, 5).await;

        let order = engine
            .create_order(&alice(), order_request(&[(&p1, 1)]))
            .await
            .unwrap();
        engine
            .transition_order(&alice(), &order.id, OrderAction::Cancel)
            .await
            .unwrap();

        let err = engine
            .transition_order(&admin(), &order.id, OrderAction::Fulfill)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition {
                status: OrderStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_transition_unknown_order() {
        let engine = setup().await;
        let err = engine
            .transition_order(&admin(), "ghost", OrderAction::Fulfill)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_replenish_policy_never() {
        let engine =
            setup_with(EngineConfig::default().replenish_on_cancel(ReplenishPolicy::Never)).await;
        let p1 = add_product(&engine, "Milk", 300, 3).await;

        let order = engine
            .create_order(&alice(), order_request(&[(&p1, 2)]))
            .await
            .unwrap();
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 1);

        let cancelled = engine
            .transition_order(&alice(), &order.id, OrderAction::Cancel)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // Policy says no automatic replenishment.
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 1);
        assert!(cancelled
            .events
            .last()
            .unwrap()
            .data
            .as_deref()
            .unwrap()
            .contains("\"stock_replenished\":false"));
    }

    // -------------------------------------------------------------------------
    // Snapshot Prices
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_total_immune_to_price_changes() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 1000, 5).await;

        let order = engine
            .create_order(&alice(), order_request(&[(&p1, 2)]))
            .await
            .unwrap();
        assert_eq!(order.total_cents, 2000);

        engine
            .update_product(
                &admin(),
                &p1.id,
                ProductUpdate {
                    price_cents: Some(9999),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reread = engine.get_order(&alice(), &order.id).await.unwrap();
        assert_eq!(reread.total_cents, 2000);
        assert_eq!(reread.lines[0].unit_price_cents, 1000);

        // The catalog price did change for future orders.
        assert_eq!(engine.get_product(&p1.id).await.unwrap().price_cents, 9999);
    }

    // -------------------------------------------------------------------------
    // Concurrency
    // -------------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_creates_last_unit() {
        let engine = Arc::new(setup().await);
        let p1 = add_product(&engine, "Last Unit", 500, 1).await;

        let a = {
            let engine = engine.clone();
            let request = order_request(&[(&p1, 1)]);
            tokio::spawn(async move { engine.create_order(&alice(), request).await })
        };
        let b = {
            let engine = engine.clone();
            let request = order_request(&[(&p1, 1)]);
            tokio::spawn(async move { engine.create_order(&bob(), request).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one of the two orders may win");

        let failure = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            failure.as_ref().unwrap_err(),
            EngineError::Core(CoreError::InsufficientStock { available: 0, .. })
        ));

        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 0);
        assert_eq!(
            engine.list_orders(&admin(), None, 10, 0).await.unwrap().len(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_double_cancel_restores_once() {
        let engine = Arc::new(setup().await);
        let p1 = add_product(&engine, "Widget", 500, 4).await;

        let order = engine
            .create_order(&alice(), order_request(&[(&p1, 4)]))
            .await
            .unwrap();
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 0);

        let a = {
            let engine = engine.clone();
            let order_id = order.id.clone();
            tokio::spawn(
                async move { engine.transition_order(&alice(), &order_id, OrderAction::Cancel).await },
            )
        };
        let b = {
            let engine = engine.clone();
            let order_id = order.id.clone();
            tokio::spawn(
                async move { engine.transition_order(&admin(), &order_id, OrderAction::Cancel).await },
            )
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one cancel may win");

        // Restored exactly once, never twice.
        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 4);
    }

    // -------------------------------------------------------------------------
    // Authorization and Queries
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_authorization_rules() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 500, 10).await;

        let order = engine
            .create_order(&alice(), order_request(&[(&p1, 1)]))
            .await
            .unwrap();

        // Customers cannot fulfill, not even their own orders.
        let err = engine
            .transition_order(&alice(), &order.id, OrderAction::Fulfill)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAuthorized(_)));

        // Strangers cannot cancel or read someone else's order.
        let err = engine
            .transition_order(&bob(), &order.id, OrderAction::Cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAuthorized(_)));
        let err = engine.get_order(&bob(), &order.id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotAuthorized(_)));

        // Admins can do both.
        assert!(engine.get_order(&admin(), &order.id).await.is_ok());
        assert!(engine
            .transition_order(&admin(), &order.id, OrderAction::Cancel)
            .await
            .is_ok());

        // Inventory administration requires the admin role.
        let err = engine
            .restock(&alice(), &p1.id, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn test_list_orders_scoping_and_filters() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 500, 10).await;

        let first = engine
            .create_order(&alice(), order_request(&[(&p1, 1)]))
            .await
            .unwrap();
        engine
            .create_order(&alice(), order_request(&[(&p1, 1)]))
            .await
            .unwrap();
        engine
            .create_order(&bob(), order_request(&[(&p1, 1)]))
            .await
            .unwrap();
        engine
            .transition_order(&alice(), &first.id, OrderAction::Cancel)
            .await
            .unwrap();

        assert_eq!(
            engine.list_orders(&admin(), None, 10, 0).await.unwrap().len(),
            3
        );
        assert_eq!(
            engine.list_orders(&alice(), None, 10, 0).await.unwrap().len(),
            2
        );
        assert_eq!(
            engine.list_orders(&bob(), None, 10, 0).await.unwrap().len(),
            1
        );

        let cancelled = engine
            .list_orders(&admin(), Some(vec![OrderStatus::Cancelled]), 10, 0)
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, first.id);
    }

    #[tokio::test]
    async fn test_order_numbers_are_sequential() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 500, 10).await;
        let year = Utc::now().format("%Y").to_string();

        let first = engine
            .create_order(&alice(), order_request(&[(&p1, 1)]))
            .await
            .unwrap();
        let second = engine
            .create_order(&alice(), order_request(&[(&p1, 1)]))
            .await
            .unwrap();

        assert_eq!(first.order_number, format!("{}0001", year));
        assert_eq!(second.order_number, format!("{}0002", year));
    }

    #[tokio::test]
    async fn test_query_stock_and_restock() {
        let engine = setup().await;
        let p1 = add_product(&engine, "Widget", 500, 2).await;

        assert_eq!(engine.query_stock(&p1.id).await.unwrap(), 2);

        let err = engine.query_stock("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::ProductNotFound(_))
        ));

        assert_eq!(engine.restock(&admin(), &p1.id, 8).await.unwrap(), 10);

        let err = engine.restock(&admin(), "ghost", 1).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_category_management() {
        let engine = setup().await;

        let category = engine
            .create_category(
                &admin(),
                NewCategory {
                    name: "Beverages".to_string(),
                    description: Some("Drinks of all kinds".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(engine.list_categories().await.unwrap().len(), 1);

        // Product creation validates the category reference.
        let err = engine
            .create_product(
                &admin(),
                NewProduct {
                    name: "Cola".to_string(),
                    category_id: Some("ghost".to_string()),
                    price_cents: 150,
                    initial_quantity: 10,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CategoryNotFound(_)));

        let cola = engine
            .create_product(
                &admin(),
                NewProduct {
                    name: "Cola".to_string(),
                    category_id: Some(category.id.clone()),
                    price_cents: 150,
                    initial_quantity: 10,
                },
            )
            .await
            .unwrap();

        let listed = engine
            .list_products(10, 0, Some(category.id.as_str()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, cola.id);

        engine.delete_category(&admin(), &category.id).await.unwrap();
        assert!(engine.list_categories().await.unwrap().is_empty());
        assert_eq!(
            engine.get_product(&cola.id).await.unwrap().category_id,
            None
        );
    }
}
