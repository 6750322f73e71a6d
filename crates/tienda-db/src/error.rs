//! # Database Error Types
//!
//! Error types for database operations, and their classification into the
//! kinds callers act on.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error ─────────┐                                                 │
//! │  CoreError ───────────┼──► DbError (this module)                        │
//! │  timeouts / config ───┘        │                                        │
//! │                                ▼                                        │
//! │                         DbError::kind()                                 │
//! │       ┌──────────┬──────────┼──────────┬───────────┐                    │
//! │       ▼          ▼          ▼          ▼           ▼                    │
//! │  Validation  NotFound   Conflict   Database    Internal                 │
//! │  (4xx)       (404)      (409)      (retried)   (5xx, generic text)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;
use tienda_core::CoreError;
use tracing::error;

/// SQLite result codes meaning "another connection holds the lock":
/// SQLITE_BUSY, SQLITE_LOCKED and their extended variants.
const SQLITE_BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517"];

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Business rule rejected the input (stock, negative ledger, bad field).
    #[error("{0}")]
    Validation(CoreError),

    /// Business rule forbids the operation (e.g. deleting sold history).
    #[error("{0}")]
    Conflict(CoreError),

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Order item referencing a product id that does not exist
    /// - Inventory row for an unknown product
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Another writer holds the database lock (SQLITE_BUSY).
    ///
    /// With serializable transactions this is how a lost write race shows
    /// up. Retryable.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Acquire or body exceeded its time budget.
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// Transaction failed to begin or commit.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// =============================================================================
// Classification
// =============================================================================

/// What a caller should do with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Bad input; fix the request. Never retried.
    Validation,
    NotFound,
    /// Forbidden by a business invariant; needs an operator decision.
    Conflict,
    /// Transient storage failure; retried with backoff.
    Database,
    /// Anything unclassified. Details stay in the logs.
    Internal,
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Validation(_) | DbError::ForeignKeyViolation { .. } => ErrorKind::Validation,
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::Conflict(_) | DbError::UniqueViolation { .. } => ErrorKind::Conflict,
            DbError::ConnectionFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Busy(_)
            | DbError::Timeout { .. }
            | DbError::TransactionFailed(_)
            | DbError::PoolExhausted
            | DbError::MigrationFailed(_) => ErrorKind::Database,
            DbError::Internal(_) | DbError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Only Database-kind errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Database
    }

    /// Message safe to hand to an external caller.
    ///
    /// Internal errors are logged in full and replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => {
                error!(error = %self, "Internal error");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → constraint type, busy, or QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if code.is_some_and(|c| SQLITE_BUSY_CODES.contains(&c.as_ref()))
                    || msg.contains("database is locked")
                {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Routes domain errors to the kind callers act on.
impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => DbError::not_found("Product", id),
            CoreError::Blocked { .. } => DbError::Conflict(err),
            CoreError::InsufficientStock { .. }
            | CoreError::NegativeStock { .. }
            | CoreError::Validation(_) => DbError::Validation(err),
        }
    }
}

impl From<tienda_core::ValidationError> for DbError {
    fn from(err: tienda_core::ValidationError) -> Self {
        DbError::Validation(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_are_classified() {
        let stock: DbError = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(stock.kind(), ErrorKind::Validation);
        assert_eq!(
            stock.public_message(),
            "Insufficient stock for p-1: available 1, requested 2"
        );

        let blocked: DbError = CoreError::Blocked {
            product_id: "p-1".to_string(),
            order_count: 3,
        }
        .into();
        assert_eq!(blocked.kind(), ErrorKind::Conflict);

        let missing: DbError = CoreError::ProductNotFound("p-9".to_string()).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(missing.to_string(), "Product not found: p-9");
    }

    #[test]
    fn test_only_database_kind_is_retryable() {
        assert!(DbError::Busy("database is locked".into()).is_retryable());
        assert!(DbError::PoolExhausted.is_retryable());
        assert!(DbError::Timeout {
            operation: "transaction".into(),
            millis: 10
        }
        .is_retryable());
        assert!(!DbError::not_found("Order", "o-1").is_retryable());
        assert!(!DbError::Internal("boom".into()).is_retryable());
        assert!(!DbError::duplicate("sku", "A").is_retryable());
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = DbError::Internal("decode column 7 failed".into());
        assert_eq!(err.public_message(), "An internal error occurred");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
