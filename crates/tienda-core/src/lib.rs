//! # tienda-core: Pure Business Logic for the Tienda Back-Office
//!
//! Cost attribution, inventory ledger math and report aggregation as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Tienda Back-Office Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 HTTP handlers (storefront + admin)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        tienda-db: Backoffice, transactions, cache, SQLite       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tienda-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌───────────┐  ┌──────────────┐    │   │
//! │  │   │  money  │  │  cost   │  │ inventory │  │    report    │    │   │
//! │  │   │  Money  │  │ 5 tiers │  │  ledger   │  │ financial    │    │   │
//! │  │   │  Rate   │  │         │  │  alerts   │  │ sales, users │    │   │
//! │  │   └─────────┘  └─────────┘  └───────────┘  └──────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Product, User, ...) and write requests
//! - [`money`] - Money type with integer arithmetic
//! - [`cost`] - Five-tier cost resolution for order lines
//! - [`inventory`] - Stock levels, movements, alert thresholds
//! - [`report`] - Financial, sales and user report builders
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tienda_core::cost::{resolve_line_cost, CostSource, CostSources};
//! use tienda_core::money::Money;
//! use tienda_core::types::Rate;
//!
//! // No inventory cost, no supplier price: the product margin applies
//! let sources = CostSources {
//!     margin: Some(Rate::from_percentage(40.0)),
//!     ..Default::default()
//! };
//! let resolved = resolve_line_cost(&sources, 2, Money::from_cents(50_000), None);
//!
//! assert_eq!(resolved.source, CostSource::ProductMargin);
//! assert_eq!(resolved.cost.cents(), 60_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cost;
pub mod error;
pub mod inventory;
pub mod money;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Bucket name for orders without a payment method.
pub const UNKNOWN_PAYMENT_METHOD: &str = "Unknown";

/// Length of the top-products and top-customers rankings.
pub const TOP_N: usize = 10;

/// Maximum quantity of a single order or cart line.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Largest page a listing may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Settings key holding the site-wide default margin (percentage string).
pub const DEFAULT_MARGIN_SETTING: &str = "default_product_margin";
