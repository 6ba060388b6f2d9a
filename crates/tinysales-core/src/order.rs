//! # Order Construction
//!
//! Builds and validates a prospective order before it is committed.
//!
//! ## Where This Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Order Creation Flow                                │
//! │                                                                     │
//! │  Coordinator (tinysales-engine)                                     │
//! │       │                                                             │
//! │       │ 1. lock products (sorted by id)                             │
//! │       │ 2. fetch Product rows                                       │
//! │       ▼                                                             │
//! │  build_order(request, products)   ← THIS MODULE (pure)              │
//! │       │                                                             │
//! │       │ validates lines, freezes price/name snapshots,              │
//! │       │ computes the fixed total                                    │
//! │       ▼                                                             │
//! │  OrderDraft ──► 3. reserve stock per line                           │
//! │                 4. persist order + lines + event                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Construction never touches the Stock Ledger: validation and stock
//! mutation stay in one atomic unit owned by the coordinator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Product;
use crate::validation;
use crate::{MAX_LINE_QUANTITY, MAX_ORDER_LINES};

// =============================================================================
// Request Types
// =============================================================================

/// One requested line: which product, how many.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// A request to create an order, as received from a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub contact_name: String,
    pub contact_email: String,
    pub delivery_address: String,
    pub lines: Vec<LineRequest>,
}

// =============================================================================
// Draft Types
// =============================================================================

/// A validated line with frozen product snapshots.
#[derive(Debug, Clone)]
pub struct DraftLine {
    pub product_id: String,
    /// Product name at order time (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Unit price at order time (frozen). Later price changes never
    /// alter this value or the order total derived from it.
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// A fully validated prospective order, ready for reservation and
/// persistence. Identifiers and timestamps are assigned by the storage
/// layer when the draft is committed.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub contact_name: String,
    pub contact_email: String,
    pub delivery_address: String,
    pub lines: Vec<DraftLine>,
    /// Σ quantity × unit_price_cents over all lines. Fixed here, never
    /// recomputed from live prices.
    pub total_cents: i64,
}

// =============================================================================
// Builder
// =============================================================================

/// Validates an order request against the product snapshots the
/// coordinator fetched, and freezes per-line price/name snapshots.
///
/// ## Rejections
/// - no lines → `EmptyOrder`
/// - quantity <= 0 → `InvalidQuantity`
/// - quantity > [`MAX_LINE_QUANTITY`] → `QuantityTooLarge`
/// - more than [`MAX_ORDER_LINES`] lines → validation error
/// - same product on two lines → validation error
/// - product not in `products` → `ProductNotFound`
/// - product present but inactive → `ProductUnavailable`
/// - malformed contact fields → validation error
///
/// `products` must contain the rows for every distinct product id the
/// request references; the coordinator fetches them inside the locked
/// region so the snapshot cannot race a price update.
pub fn build_order(request: &OrderRequest, products: &[Product]) -> CoreResult<OrderDraft> {
    if request.lines.is_empty() {
        return Err(CoreError::EmptyOrder);
    }

    if request.lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        }
        .into());
    }

    validation::validate_contact_name(&request.contact_name)?;
    validation::validate_contact_email(&request.contact_email)?;
    validation::validate_delivery_address(&request.delivery_address)?;

    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut lines = Vec::with_capacity(request.lines.len());
    let mut total = Money::zero();

    for line in &request.lines {
        if line.quantity <= 0 {
            return Err(CoreError::InvalidQuantity {
                quantity: line.quantity,
            });
        }
        if line.quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: line.quantity,
                max: MAX_LINE_QUANTITY,
            });
        }

        // One line per product; duplicates are a caller bug, not a merge.
        if lines
            .iter()
            .any(|l: &DraftLine| l.product_id == line.product_id)
        {
            return Err(ValidationError::Duplicate {
                field: "product_id".to_string(),
                value: line.product_id.clone(),
            }
            .into());
        }

        let product = by_id
            .get(line.product_id.as_str())
            .copied()
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        if !product.is_orderable() {
            return Err(CoreError::ProductUnavailable(product.id.clone()));
        }

        let overflow = || ValidationError::OutOfRange {
            field: "total_cents".to_string(),
            min: 0,
            max: i64::MAX,
        };
        let line_total = product
            .price()
            .times(line.quantity)
            .ok_or_else(overflow)?;
        total = total.checked_add(line_total).ok_or_else(overflow)?;

        lines.push(DraftLine {
            product_id: product.id.clone(),
            name_snapshot: product.name.clone(),
            quantity: line.quantity,
            unit_price_cents: product.price_cents,
            line_total_cents: line_total.cents(),
        });
    }

    Ok(OrderDraft {
        contact_name: request.contact_name.trim().to_string(),
        contact_email: request.contact_email.trim().to_string(),
        delivery_address: request.delivery_address.trim().to_string(),
        lines,
        total_cents: total.cents(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
