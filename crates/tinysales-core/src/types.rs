//! # Domain Types
//!
//! Core domain types used throughout Tiny Sales.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌────────────────┐   ┌────────────────┐   ┌────────────────┐      │
//! │  │    Product     │   │     Order      │   │   OrderLine    │      │
//! │  │  ────────────  │   │  ────────────  │   │  ────────────  │      │
//! │  │  id            │   │  id            │   │  id            │      │
//! │  │  name          │   │  order_number  │   │  order_id (FK) │      │
//! │  │  category_id   │◄──┤  customer_id   │──►│  product_id    │      │
//! │  │  price_cents   │   │  status        │   │  quantity      │      │
//! │  │  available_qty │   │  total_cents   │   │  price snapshot│      │
//! │  └────────────────┘   └────────────────┘   └────────────────┘      │
//! │                                                                     │
//! │  ┌────────────────┐   ┌────────────────┐   ┌────────────────┐      │
//! │  │    Category    │   │  OrderStatus   │   │   OrderEvent   │      │
//! │  │  ────────────  │   │  ────────────  │   │  ────────────  │      │
//! │  │  id            │   │  Pending       │   │  event_type    │      │
//! │  │  name (unique) │   │  Fulfilled     │   │  data (JSON)   │      │
//! │  └────────────────┘   │  Cancelled     │   │  occurred_at   │      │
//! │                       └────────────────┘   └────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership Rules
//! - `Order` exclusively owns its `OrderLine`s and `OrderEvent`s
//!   (composition: they never exist without a parent order)
//! - `OrderLine` references `Product` by id only, never by ownership:
//!   deactivating a product does not touch order history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available for ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (time-ordered UUID string).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Category this product belongs to, if any (weak reference).
    pub category_id: Option<String>,

    /// Current price in cents. Order lines snapshot this value; changing
    /// it never affects existing orders.
    pub price_cents: i64,

    /// Units currently available for reservation. Never negative.
    pub available_quantity: i64,

    /// Whether the product can be ordered (soft delete flag).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the current price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the product can appear on a new order.
    #[inline]
    pub fn is_orderable(&self) -> bool {
        self.is_active
    }
}

// =============================================================================
// Category
// =============================================================================

/// A product category. Many products to one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: String,
    /// Unique name.
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
///
/// ## Lifecycle
/// `Pending` is the only non-terminal state; see [`crate::lifecycle`] for
/// the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Stock is reserved, order not yet shipped.
    Pending,
    /// Order shipped; the stock commitment is final.
    Fulfilled,
    /// Order cancelled; reserved stock was released.
    Cancelled,
}

impl OrderStatus {
    /// Terminal states permit no further transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order with its owned lines and event trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Human-readable order number, `<year><seq>` (e.g. `20260001`).
    pub order_number: String,
    /// Owning customer (authenticated identity supplied by the caller).
    pub customer_id: String,
    pub contact_name: String,
    pub contact_email: String,
    pub delivery_address: String,
    pub status: OrderStatus,
    /// Fixed at creation from line snapshots; never recomputed.
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owned line items, in insertion order.
    pub lines: Vec<OrderLine>,
    /// Owned audit events, oldest first.
    pub events: Vec<OrderEvent>,
}

impl Order {
    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// A line item in an order.
/// Uses the snapshot pattern to freeze product data at order time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at order time (frozen).
    pub name_snapshot: String,
    /// Quantity ordered. Immutable once created: cancellation releases
    /// stock but the recorded quantity is preserved for audit.
    pub quantity: i64,
    /// Unit price in cents at order time (frozen).
    pub unit_price_cents: i64,
    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    /// Returns the snapshot unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Order Event
// =============================================================================

/// Well-known order event types.
pub const EVENT_ORDER_PLACED: &str = "order_placed";
pub const EVENT_ORDER_FULFILLED: &str = "order_fulfilled";
pub const EVENT_ORDER_CANCELLED: &str = "order_cancelled";

/// An entry in an order's audit trail.
///
/// Appended in the same transaction as the state change it records, so
/// the trail never disagrees with the order's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderEvent {
    pub id: String,
    pub order_id: String,
    /// One of the `EVENT_*` constants.
    pub event_type: String,
    /// Optional JSON payload with event context.
    pub data: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

// =============================================================================
// Identity
// =============================================================================

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access: any order, inventory administration.
    Admin,
    /// Access limited to the caller's own orders.
    Customer,
}

/// An authenticated caller, as supplied by the authentication
/// collaborator. The engine trusts this identity as given; it performs
/// authorization, never authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    /// Convenience constructor for an admin identity.
    pub fn admin(user_id: impl Into<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    /// Convenience constructor for a customer identity.
    pub fn customer(user_id: impl Into<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            role: Role::Customer,
        }
    }

    /// Checks whether this identity may act on the given order.
    #[inline]
    pub fn can_access_order(&self, order: &Order) -> bool {
        self.role == Role::Admin || order.customer_id == self.user_id
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Fulfilled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_identity_order_access() {
        let order = Order {
            id: "o1".to_string(),
            order_number: "20260001".to_string(),
            customer_id: "alice".to_string(),
            contact_name: "Alice".to_string(),
            contact_email: "alice@example.com".to_string(),
            delivery_address: "1 Main St".to_string(),
            status: OrderStatus::Pending,
            total_cents: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            lines: Vec::new(),
            events: Vec::new(),
        };

        assert!(Identity::customer("alice").can_access_order(&order));
        assert!(!Identity::customer("bob").can_access_order(&order));
        assert!(Identity::admin("root").can_access_order(&order));
    }
}
