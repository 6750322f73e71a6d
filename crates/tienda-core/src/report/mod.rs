//! # Reports
//!
//! Pure aggregation over orders that the database layer has already loaded.
//!
//! ## Report Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tienda-db::repository::report          tienda-core::report (here)     │
//! │  ─────────────────────────────          ───────────────────────────    │
//! │  SELECT orders in period ──────┐                                        │
//! │  SELECT items + product +      ├──► Vec<ReportOrder> ──► build_*()      │
//! │         inventory cost ────────┘                            │           │
//! │  settings.default_product_margin ───────────────────────────┤           │
//! │                                                             ▼           │
//! │                                 FinancialReport / SalesReport / ...     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Builders re-apply their own order predicate (paid, completed, in period)
//! so they stay correct whatever the loader hands them.

pub mod financial;
pub mod sales;
pub mod users;

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cost::CostSources;
use crate::money::Money;
use crate::types::{OrderStatus, PaymentStatus};

pub use financial::{build_financial_report, CostCoverage, FinancialReport, MonthlyFinancials};
pub use sales::{build_sales_report, SalesGrouping, SalesReport};
pub use users::{build_user_report, UserReport};

// =============================================================================
// Period
// =============================================================================

/// Inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReportPeriod {
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

// =============================================================================
// Loaded Orders
// =============================================================================

/// An order with the per-line data every report needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOrder {
    pub id: String,
    pub user_id: Option<String>,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<ReportLine>,
}

/// One order item joined with its product and inventory cost metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLine {
    pub product_id: String,
    pub product_name: String,
    /// Raw comma-separated categories of the product.
    pub categories: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub cost_sources: CostSources,
}

impl ReportLine {
    pub fn revenue(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Buckets
// =============================================================================

/// "YYYY-MM" in the reporting offset.
pub fn month_key(at: DateTime<Utc>, tz: FixedOffset) -> String {
    at.with_timezone(&tz).format("%Y-%m").to_string()
}

/// "YYYY-MM-DD" in the reporting offset.
pub fn day_key(at: DateTime<Utc>, tz: FixedOffset) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

/// ISO week, "YYYY-Www". The year is the ISO week-year, so 2024-12-30 is
/// "2025-W01".
pub fn week_key(at: DateTime<Utc>, tz: FixedOffset) -> String {
    let week = at.with_timezone(&tz).iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Converts minutes east of UTC into an offset, falling back to UTC when out
/// of range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or(Utc.fix())
}

// =============================================================================
// Unit Tests
// =============================================================================
