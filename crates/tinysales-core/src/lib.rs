//! # tinysales-core: Pure Business Logic for Tiny Sales
//!
//! This crate is the **heart** of the Tiny Sales order/inventory system.
//! It contains all business rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Tiny Sales Architecture                         │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP / CLI collaborators (external)            │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │              tinysales-engine (coordinator)                 │   │
//! │  │    create_order, transition_order, query_stock, ...         │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │             ★ tinysales-core (THIS CRATE) ★                 │   │
//! │  │                                                             │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌────────────┐    │   │
//! │  │  │  types   │ │  money   │ │ lifecycle │ │   order    │    │   │
//! │  │  │ Product  │ │  Money   │ │  pending  │ │ build_order│    │   │
//! │  │  │  Order   │ │  cents   │ │ fulfilled │ │ snapshots  │    │   │
//! │  │  │OrderLine │ │          │ │ cancelled │ │  totals    │    │   │
//! │  │  └──────────┘ └──────────┘ └───────────┘ └────────────┘    │   │
//! │  │                                                             │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS        │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │              tinysales-db (storage layer)                   │   │
//! │  │       SQLite repositories, migrations, Stock Ledger         │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Category, Order, OrderLine, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`lifecycle`] - Order status state machine
//! - [`order`] - Order construction and validation
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input =
//!    same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid
//!    float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lifecycle;
pub mod money;
pub mod order;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tinysales_core::Order` instead of
// `use tinysales_core::types::Order`

pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::{transition, OrderAction, StockEffect, Transition};
pub use money::Money;
pub use order::{build_order, DraftLine, LineRequest, OrderDraft, OrderRequest};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines allowed in a single order.
///
/// ## Business Reason
/// Prevents runaway orders and keeps the per-order lock set bounded.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity for a single order line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
