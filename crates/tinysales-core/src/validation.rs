//! # Validation Module
//!
//! Field-level validation for caller input.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                              │
//! │                                                                     │
//! │  Layer 1: Collaborator (HTTP/CLI request schemas)                   │
//! │  └── Shape checks, deserialization                                  │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 2: THIS MODULE + order::build_order                          │
//! │  └── Field rules and business rules                                 │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 3: Database (SQLite)                                         │
//! │  └── NOT NULL / UNIQUE / CHECK constraints                          │
//! │                                                                     │
//! │  Defense in depth: each layer catches different mistakes            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn require_nonempty(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 255 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    require_nonempty("name", name, 255)
}

/// Validates a category name.
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    require_nonempty("name", name, 100)
}

/// Validates an order contact name.
pub fn validate_contact_name(name: &str) -> ValidationResult<()> {
    require_nonempty("contact_name", name, 255)
}

/// Validates a delivery address.
pub fn validate_delivery_address(address: &str) -> ValidationResult<()> {
    require_nonempty("delivery_address", address, 1000)
}

/// Validates a contact email address.
///
/// ## Rules
/// Minimal shape check: something before and after a single `@`, a dot in
/// the domain. Deliverability is the mail system's problem, not ours.
pub fn validate_contact_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    require_nonempty("contact_email", email, 255)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "contact_email".to_string(),
        reason: "must look like name@domain.tld".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }

    Ok(())
}

/// Validates an entity identifier supplied by a caller.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters (ids are UUID strings)
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    require_nonempty(field, id, 64)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line or restock quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0); zero is allowed (free items)
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price_cents".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
