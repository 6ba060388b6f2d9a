//! # tinysales-engine: Consistency Coordinator for Tiny Sales
//!
//! The engine is the only surface HTTP/CLI collaborators talk to. It
//! serializes concurrent mutations so that order creation and lifecycle
//! transitions appear atomic with respect to stock.
//!
//! ## Concurrency Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Lock Acquisition Protocol                        │
//! │                                                                     │
//! │  create_order:                                                      │
//! │    lock products (ascending id) ──► validate ──► reserve each      │
//! │    ──► persist order  (roll back reservations on any failure)      │
//! │                                                                     │
//! │  transition_order(cancel):                                          │
//! │    lock products (ascending id) ──► lock order ──► re-read status  │
//! │    ──► state machine ──► status + releases + event in one tx       │
//! │                                                                     │
//! │  transition_order(fulfill):                                         │
//! │    lock order ──► re-read status ──► status + event in one tx      │
//! │                                                                     │
//! │  Global ordering: products (ascending), then the order lock.        │
//! │  Two requests can never hold locks in conflicting orders, so        │
//! │  deadlock is impossible.                                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`service`] - [`OrderEngine`]: create/transition/query operations
//! - [`locks`] - Per-product and per-order lock registry
//! - [`config`] - Engine configuration (replenishment policy)
//! - [`error`] - Service-boundary error type

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod locks;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig, ReplenishPolicy};
pub use error::{EngineError, EngineResult};
pub use locks::LockRegistry;
pub use service::{NewCategory, NewProduct, OrderEngine, ProductUpdate};
