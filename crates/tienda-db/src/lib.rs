//! # tienda-db: Database Layer for the Tienda Back-Office
//!
//! Persistence, transactions and caching for the back-office core. SQLite
//! through sqlx, with every multi-row write running inside one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tienda Back-Office Data Flow                       │
//! │                                                                         │
//! │  Admin handler (financial report, checkout, stock adjustment)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tienda-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌───────────────┐   ┌────────────────┐    │   │
//! │  │   │  Backoffice  │──►│  transaction  │──►│  repository    │    │   │
//! │  │   │ (service.rs) │   │ retry+timeout │   │  compound fns  │    │   │
//! │  │   │              │   └───────────────┘   │  + reads       │    │   │
//! │  │   │              │──►┌───────────────┐   └───────┬────────┘    │   │
//! │  │   └──────────────┘   │   TtlCache    │           │             │   │
//! │  │                      │ reports, lists│   ┌───────▼────────┐    │   │
//! │  │                      └───────────────┘   │ Database (pool)│    │   │
//! │  │                                          │ migrations     │    │   │
//! │  │                                          └───────┬────────┘    │   │
//! │  └──────────────────────────────────────────────────┼─────────────┘   │
//! │                                                     ▼                  │
//! │                                          SQLite (WAL, foreign keys)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cost resolution and report math live in `tienda-core`; this crate loads
//! their inputs and caches their outputs.
//!
//! ## Module Organization
//!
//! - [`service`] - `Backoffice`, the composed entry point
//! - [`transaction`] - Transaction runner with time budgets and retry
//! - [`cache`] - TTL cache with FIFO eviction and a background sweep
//! - [`repository`] - Reads and compound writes per table group
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - TOML + environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types and classification
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tienda_db::{Backoffice, TiendaConfig};
//!
//! let config = TiendaConfig::load(None)?;
//! let office = Backoffice::connect(&config).await?;
//!
//! let report = office.generate_financial_report(start, end).await?;
//! println!("profit: {}", report.gross_profit);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;
pub mod transaction;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{CacheStats, TtlCache};
pub use config::TiendaConfig;
pub use error::{DbError, DbResult, ErrorKind};
pub use pool::{Database, DbConfig};
pub use service::{Backoffice, CachedValue};
pub use transaction::{
    execute_transaction_with_retry, run_in_transaction, IsolationLevel, RetryPolicy,
    TransactionConfig, TxFuture,
};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::order::OrderRepository;
pub use repository::payment_profile::PaymentProfileRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::settings::SettingsRepository;
pub use repository::user::UserRepository;
