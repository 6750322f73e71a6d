//! # Transaction Coordinator
//!
//! Runs compound writes atomically, with time budgets and retry.
//!
//! ## Transaction Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  execute_transaction_with_retry(pool, config, policy, op)              │
//! │       │                                                                 │
//! │       ▼   attempt n                                                     │
//! │  ┌────────────────────────────────────────────────────────────┐        │
//! │  │ run_in_transaction                                         │        │
//! │  │   pool.begin()          bounded by max_wait                │        │
//! │  │   op(&mut conn).await   bounded by timeout                 │        │
//! │  │   Ok  → COMMIT                                             │        │
//! │  │   Err → ROLLBACK (nothing written)                         │        │
//! │  └────────────────────────────────────────────────────────────┘        │
//! │       │                                                                 │
//! │       ├── Ok ─────────────────────────────────► return value           │
//! │       ├── Err, retryable, n <= max_retries ──► sleep base·2ⁿ, n += 1   │
//! │       └── Err otherwise ──────────────────────► return error           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Writing an Operation
//! The operation receives the connection of the open transaction. Every
//! sub-write must go through that connection; anything written through the
//! pool instead is outside the atomicity boundary.
//!
//! ```rust,ignore
//! let order = execute_transaction_with_retry(db.pool(), &config, &policy, |conn| {
//!     let (order, items) = (order.clone(), items.clone());
//!     Box::pin(async move { create_order_with_items(conn, order, items).await })
//! })
//! .await?;
//! ```
//!
//! The body is re-run in full on retry, so it must not have side effects
//! outside the database.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

/// Future returned by a transaction body, borrowing the transaction's
/// connection for `'t`.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = DbResult<T>> + Send + 't>>;

// =============================================================================
// Configuration
// =============================================================================

/// Requested isolation for compound writes.
///
/// SQLite serializes writers, so every transaction it runs is serializable
/// whatever is requested. Weaker levels are accepted for configuration
/// compatibility and logged as a warning when a transaction starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Budget for the transaction body.
    pub timeout: Duration,
    /// Budget for acquiring a connection and issuing BEGIN.
    pub max_wait: Duration,
    pub isolation: IsolationLevel,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        TransactionConfig {
            timeout: Duration::from_secs(10),
            max_wait: Duration::from_secs(5),
            isolation: IsolationLevel::Serializable,
        }
    }
}

/// Exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Never retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay after `attempt` (1-based) failed: `base_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

// =============================================================================
// Execution
// =============================================================================

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Runs `op` inside one transaction.
///
/// Commits when `op` succeeds. On error or timeout the transaction is rolled
/// back and the error returned; no write from `op` survives.
pub async fn run_in_transaction<T, F>(
    pool: &SqlitePool,
    config: &TransactionConfig,
    op: F,
) -> DbResult<T>
where
    F: for<'t> FnOnce(&'t mut SqliteConnection) -> TxFuture<'t, T>,
{
    if config.isolation != IsolationLevel::Serializable {
        warn!(
            requested = ?config.isolation,
            "SQLite only runs serializable transactions, ignoring requested isolation"
        );
    }

    let mut tx = match timeout(config.max_wait, pool.begin()).await {
        Ok(Ok(tx)) => tx,
        Ok(Err(e)) => return Err(DbError::from(e)),
        Err(_) => {
            return Err(DbError::Timeout {
                operation: "transaction begin".to_string(),
                millis: millis(config.max_wait),
            })
        }
    };

    debug!("Transaction started");

    let outcome = match timeout(config.timeout, op(&mut *tx)).await {
        Ok(result) => result,
        Err(_) => Err(DbError::Timeout {
            operation: "transaction".to_string(),
            millis: millis(config.timeout),
        }),
    };

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                // Dropping the connection still discards the transaction
                warn!(error = %rollback_err, "Rollback failed");
            }
            debug!(error = %err, "Transaction rolled back");
            Err(err)
        }
    }
}

/// Runs `op` in a transaction, retrying retryable failures with backoff.
///
/// Only [`DbError::is_retryable`] errors are retried; validation, conflict
/// and not-found errors return after the first attempt. When retries are
/// exhausted the last error is returned.
pub async fn execute_transaction_with_retry<T, F>(
    pool: &SqlitePool,
    config: &TransactionConfig,
    policy: &RetryPolicy,
    op: F,
) -> DbResult<T>
where
    F: for<'t> Fn(&'t mut SqliteConnection) -> TxFuture<'t, T>,
{
    let mut attempt: u32 = 1;

    loop {
        match run_in_transaction(pool, config, &op).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Transaction succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt <= policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = millis(delay),
                    error = %err,
                    "Transaction failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_retryable() {
                    warn!(attempt, error = %err, "Transaction retries exhausted");
                }
                return Err(err);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
