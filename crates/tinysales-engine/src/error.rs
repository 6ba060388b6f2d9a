//! Error types at the engine's service boundary.
//!
//! Every business rejection is a [`tinysales_core::CoreError`] passed
//! through unchanged, so collaborators can match on the exact kind
//! (`InsufficientStock`, `InvalidTransition`, ...). `Db` wraps unexpected
//! persistence failures; by the time one propagates, the engine has
//! already rolled back any in-progress reservations.

use thiserror::Error;

use tinysales_core::CoreError;
use tinysales_db::DbError;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Business rule rejection (recoverable by the caller).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Caller's identity may not perform this operation.
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Referenced category does not exist.
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Unexpected storage failure. All partial work was rolled back
    /// before this surfaced.
    #[error("Storage error: {0}")]
    Db(#[from] DbError),
}

// Transaction begin/commit surface raw sqlx errors; categorize them the
// same way the storage layer does.
impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(err.into())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
