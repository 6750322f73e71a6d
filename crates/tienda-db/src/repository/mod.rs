//! # Repository Module
//!
//! Database access for the back-office.
//!
//! ## Two Kinds of Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads                              Compound writes                     │
//! │  ─────                              ───────────────                     │
//! │  db.orders().get_by_id(id)          order::create_order_with_items(     │
//! │  db.products().list(page, limit)        conn, order, items)             │
//! │  db.reports().paid_orders(period)   product::delete_product_completely( │
//! │       │                                 conn, product_id)               │
//! │       │ &SqlitePool                      │ &mut SqliteConnection        │
//! │       ▼                                  ▼                              │
//! │  any pooled connection              the connection of ONE transaction   │
//! │                                     opened by transaction.rs            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Compound writes never open their own transaction. They take the
//! connection of the caller's transaction so several of them can share
//! one atomicity boundary.
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`] - Checkout and order reads
//! - [`ProductRepository`] - Catalog writes, cascading delete, paged listing
//! - [`InventoryRepository`] - Stock ledger, movements and alerts
//! - [`CartRepository`] - Cart replacement
//! - [`UserRepository`] - Users with their cart
//! - [`PaymentProfileRepository`] - Active payment profile switch
//! - [`SettingsRepository`] - Key/value settings
//! - [`ReportRepository`] - Report input loaders
//!
//! [`OrderRepository`]: order::OrderRepository
//! [`ProductRepository`]: product::ProductRepository
//! [`InventoryRepository`]: inventory::InventoryRepository
//! [`CartRepository`]: cart::CartRepository
//! [`UserRepository`]: user::UserRepository
//! [`PaymentProfileRepository`]: payment_profile::PaymentProfileRepository
//! [`SettingsRepository`]: settings::SettingsRepository
//! [`ReportRepository`]: report::ReportRepository

pub mod cart;
pub mod inventory;
pub mod order;
pub mod payment_profile;
pub mod product;
pub mod report;
pub mod settings;
pub mod user;

/// Placeholders for an `IN (...)` clause with `n` bound values.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// =============================================================================
// Test Fixtures
// =============================================================================
