//! # Order Lifecycle State Machine
//!
//! Validates status transitions and names the stock effect each legal
//! transition carries. This module is the single transition authority:
//! the coordinator re-reads an order's status under lock and asks this
//! table what may happen next.
//!
//! ## State Diagram
//! ```text
//!                  ┌─────────────┐
//!                  │   Pending   │  stock reserved at creation
//!                  └──────┬──────┘
//!                         │
//!            ┌────────────┴────────────┐
//!            │ fulfill                 │ cancel
//!            ▼                         ▼
//!     ┌─────────────┐          ┌─────────────┐
//!     │  Fulfilled  │          │  Cancelled  │
//!     └─────────────┘          └─────────────┘
//!       (terminal)               (terminal)
//!      stock effect:            stock effect:
//!      none                     release every line
//! ```
//!
//! ## Conservation Invariant
//! The net stock decrement applied on behalf of an order equals its line
//! quantities exactly while the order is `Pending` or `Fulfilled`, and
//! zero once it is `Cancelled`. Fulfillment is a status-only change: the
//! stock commitment already happened at creation.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::OrderStatus;

// =============================================================================
// Actions and Effects
// =============================================================================

/// An action requested against an order's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    /// Mark the order shipped.
    Fulfill,
    /// Cancel the order.
    Cancel,
}

impl OrderAction {
    /// Stable name used in error messages and event payloads.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Fulfill => "fulfill",
            OrderAction::Cancel => "cancel",
        }
    }
}

/// The stock side effect a transition instructs the coordinator to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// No stock movement.
    None,
    /// Release the full reserved quantity of every order line.
    ReleaseAll,
}

/// A validated transition: the next status and its stock effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: OrderStatus,
    pub effect: StockEffect,
}

// =============================================================================
// Transition Table
// =============================================================================

/// Applies the transition table to a current status and action.
///
/// | From     | Action  | To        | Stock Effect |
/// |----------|---------|-----------|--------------|
/// | pending  | fulfill | fulfilled | none         |
/// | pending  | cancel  | cancelled | release all  |
/// | fulfilled| *       | rejected  | none         |
/// | cancelled| *       | rejected  | none         |
///
/// Returns `InvalidTransition` for every request out of a terminal
/// state. Rejections carry the observed status so callers can report
/// which concurrent change won the race.
pub fn transition(
    order_id: &str,
    status: OrderStatus,
    action: OrderAction,
) -> CoreResult<Transition> {
    match (status, action) {
        (OrderStatus::Pending, OrderAction::Fulfill) => Ok(Transition {
            next: OrderStatus::Fulfilled,
            effect: StockEffect::None,
        }),
        (OrderStatus::Pending, OrderAction::Cancel) => Ok(Transition {
            next: OrderStatus::Cancelled,
            effect: StockEffect::ReleaseAll,
        }),
        (status, action) => Err(CoreError::InvalidTransition {
            order_id: order_id.to_string(),
            status,
            action: action.as_str().to_string(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_fulfill() {
        let t = transition("o1", OrderStatus::Pending, OrderAction::Fulfill).unwrap();
        assert_eq!(t.next, OrderStatus::Fulfilled);
        assert_eq!(t.effect, StockEffect::None);
    }

    #[test]
    fn test_pending_cancel_releases_stock() {
        let t = transition("o1", OrderStatus::Pending, OrderAction::Cancel).unwrap();
        assert_eq!(t.next, OrderStatus::Cancelled);
        assert_eq!(t.effect, StockEffect::ReleaseAll);
    }

    #[test]
    fn test_no_exit_from_fulfilled() {
        for action in [OrderAction::Fulfill, OrderAction::Cancel] {
            let err = transition("o1", OrderStatus::Fulfilled, action).unwrap_err();
            assert!(matches!(
                err,
                CoreError::InvalidTransition {
                    status: OrderStatus::Fulfilled,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_no_exit_from_cancelled() {
        for action in [OrderAction::Fulfill, OrderAction::Cancel] {
            let err = transition("o1", OrderStatus::Cancelled, action).unwrap_err();
            assert!(matches!(
                err,
                CoreError::InvalidTransition {
                    status: OrderStatus::Cancelled,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_rejection_names_the_action() {
        let err = transition("o1", OrderStatus::Cancelled, OrderAction::Fulfill).unwrap_err();
        assert_eq!(err.to_string(), "Order o1 is Cancelled, cannot fulfill");
    }
}
