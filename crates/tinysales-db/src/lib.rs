//! # tinysales-db: Database Layer for Tiny Sales
//!
//! This crate provides database access for the Tiny Sales system.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Tiny Sales Data Flow                           │
//! │                                                                     │
//! │  tinysales-engine (create_order, transition_order, ...)             │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                  tinysales-db (THIS CRATE)                  │   │
//! │  │                                                             │   │
//! │  │   ┌────────────┐  ┌──────────────┐  ┌──────────────────┐   │   │
//! │  │   │  Database  │  │ Repositories │  │   StockLedger    │   │   │
//! │  │   │ (pool.rs)  │  │ product.rs   │  │   (ledger.rs)    │   │   │
//! │  │   │            │  │ category.rs  │  │                  │   │   │
//! │  │   │ SqlitePool │◄─│ order.rs     │  │ reserve/release/ │   │   │
//! │  │   │ Migrations │  │              │  │ query            │   │   │
//! │  │   └────────────┘  └──────────────┘  └──────────────────┘   │   │
//! │  │                                                             │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! │       │                                                             │
//! │       ▼                                                             │
//! │                        SQLite Database                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`ledger`] - Stock Ledger: the only writer of `available_quantity`
//! - [`repository`] - Repository implementations (product, category, order)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tinysales_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/db.sqlite")).await?;
//! let product = db.products().get_by_id("some-id").await?;
//! let stock = db.ledger().query("some-id").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::{ReserveOutcome, StockLedger};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::order::{OrderFilter, OrderRepository};
pub use repository::product::ProductRepository;
