//! # Error Types
//!
//! Domain-specific error types for tinysales-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Error Types                                │
//! │                                                                     │
//! │  tinysales-core errors (this file)                                  │
//! │  ├── CoreError        - Business rule violations                    │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  tinysales-db errors (separate crate)                               │
//! │  └── DbError          - Database operation failures                 │
//! │                                                                     │
//! │  tinysales-engine errors (separate crate)                           │
//! │  └── EngineError      - What collaborators see                      │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → EngineError → caller           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities, ...)
//! 3. Errors are enum variants, never String
//! 4. Every variant is recoverable by the caller; none is fatal

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. Each maps to a
/// rejection response in the surrounding HTTP/CLI collaborator.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An order was submitted with no lines.
    #[error("Order must contain at least one line")]
    EmptyOrder,

    /// A line quantity is zero or negative.
    #[error("Invalid line quantity: {quantity} (must be positive)")]
    InvalidQuantity { quantity: i64 },

    /// A line quantity exceeds the per-line maximum.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Product cannot be found.
    ///
    /// ## When This Occurs
    /// - Product id doesn't exist in storage
    /// - Caller sent an id that was never issued
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product exists but cannot be ordered.
    ///
    /// ## When This Occurs
    /// - Product was deactivated (soft delete) while still referenced
    ///   by carts or retry loops
    #[error("Product unavailable: {0}")]
    ProductUnavailable(String),

    /// Insufficient stock to reserve the requested quantity.
    ///
    /// ## Reservation Workflow
    /// ```text
    /// create_order [(P1, 3), (P2, 2)]
    ///      │
    ///      ▼
    /// reserve(P1, 3)  → ok, P1 stock committed
    ///      │
    ///      ▼
    /// reserve(P2, 2)  → available=1
    ///      │
    ///      ▼
    /// release(P1, 3)  ← compensating rollback
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: P2, available: 1, requested: 2 }
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Order is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Cancelling an already-cancelled order
    /// - Fulfilling or cancelling from a terminal state
    /// - A concurrent request won the transition race
    #[error("Order {order_id} is {status:?}, cannot {action}")]
    InvalidTransition {
        order_id: String,
        status: OrderStatus,
        action: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet field-level
/// requirements. Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., same product referenced twice).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "prod-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for prod-1: available 3, requested 5"
        );

        let err = CoreError::InvalidTransition {
            order_id: "ord-1".to_string(),
            status: OrderStatus::Cancelled,
            action: "fulfill".to_string(),
        };
        assert_eq!(err.to_string(), "Order ord-1 is Cancelled, cannot fulfill");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "contact_name".to_string(),
        };
        assert_eq!(err.to_string(), "contact_name is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "contact_name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
