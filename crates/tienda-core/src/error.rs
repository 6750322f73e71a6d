//! # Error Types
//!
//! Domain-specific error types for tienda-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tienda-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tienda-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures + ErrorKind classification   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → HTTP layer              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include the offending ids and values so callers can self-correct
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Not enough stock to fulfil a request.
    ///
    /// ## When This Occurs
    /// ```text
    /// Checkout (2 lines of product P, qty 3 + qty 4)
    ///      │
    ///      ▼
    /// Live stock read inside the transaction: P.stock = 5
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: P, available: 5, requested: 7 }
    ///      │
    ///      ▼
    /// Nothing written, transaction rolled back
    /// ```
    /// Also raised by inventory reservations when `available < qty`.
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// A ledger movement would drive quantity below zero.
    #[error("Stock cannot go negative: current {current}, resulting {resulting}")]
    NegativeStock { current: i64, resulting: i64 },

    /// Product has sold history and cannot be deleted.
    #[error("Product {product_id} cannot be deleted: referenced by {order_count} completed order(s)")]
    Blocked {
        product_id: String,
        order_count: i64,
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
/// Raised before any business logic or database write runs.
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

    /// Invalid format (e.g., invalid email, invalid date range).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Requested more than is currently held.
    #[error("{field}: requested {requested}, only {held} held")]
    Exceeds {
        field: String,
        held: i64,
        requested: i64,
    },
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
            product_id: "p-1".to_string(),
            available: 5,
            requested: 7,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for p-1: available 5, requested 7"
        );

        let err = CoreError::Blocked {
            product_id: "p-1".to_string(),
            order_count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Product p-1 cannot be deleted: referenced by 2 completed order(s)"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "customer_email".to_string(),
        };
        assert_eq!(err.to_string(), "customer_email is required");

        let err = ValidationError::Exceeds {
            field: "reserved".to_string(),
            held: 2,
            requested: 5,
        };
        assert_eq!(err.to_string(), "reserved: requested 5, only 2 held");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
