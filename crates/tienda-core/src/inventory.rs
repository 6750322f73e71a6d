//! # Inventory Ledger
//!
//! Pure stock-level math for inventory rows. Persistence lives in
//! `tienda-db::repository::inventory`; every mutation there goes through
//! the functions in this module first.
//!
//! ## Ledger Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  inventory row (snapshot)          inventory_movements (append-only)    │
//! │  ─────────────────────────         ─────────────────────────────────    │
//! │  quantity   = 40           ◄────── IN          +50  "Initial stock"     │
//! │  reserved   = 3                    OUT         -10  "Damaged"           │
//! │  available  = 37                   OUT          -3  ref: order-17       │
//! │  (always quantity - reserved)      (reservation, quantity untouched)    │
//! │                                                                         │
//! │  After every movement: evaluate_alerts(available, min, reorder)        │
//! │     → LOW_STOCK     0 < available ≤ min_stock                           │
//! │     → OUT_OF_STOCK  available == 0                                      │
//! │     → REORDER       available ≤ reorder_point                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Pagination;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum MovementType {
    /// Stock received.
    In,
    /// Stock removed.
    Out,
    /// Sets quantity to an absolute value (stock count).
    Adjustment,
    /// Stock moved in from another location. Adds, like `In`.
    Transfer,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum AlertType {
    LowStock,
    OutOfStock,
    Reorder,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowStock => "LOW_STOCK",
            AlertType::OutOfStock => "OUT_OF_STOCK",
            AlertType::Reorder => "REORDER",
        }
    }

    /// Human-readable alert text stored on the alert row.
    pub fn message(&self, sku: &str, available: i64, threshold: i64) -> String {
        match self {
            AlertType::LowStock => format!(
                "Low stock for {sku}: {available} available (minimum {threshold})"
            ),
            AlertType::OutOfStock => format!("{sku} is out of stock"),
            AlertType::Reorder => format!(
                "Reorder {sku}: {available} available (reorder point {threshold})"
            ),
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// Inventory snapshot for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Inventory {
    pub id: String,
    /// NULL once the product is deleted; the ledger outlives it.
    pub product_id: Option<String>,
    pub sku: String,
    pub quantity: i64,
    pub reserved: i64,
    pub available: i64,
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    pub reorder_point: i64,
    /// Unit cost (cost tier 1).
    pub cost: Option<Money>,
    pub location: Option<String>,
    pub supplier: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    pub fn levels(&self) -> StockLevels {
        StockLevels {
            quantity: self.quantity,
            reserved: self.reserved,
            available: self.available,
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.available > 0 && self.available <= self.min_stock
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.available == 0
    }

    /// Label used in errors and alert messages.
    pub fn label(&self) -> &str {
        self.product_id.as_deref().unwrap_or(&self.sku)
    }
}

/// Append-only ledger entry. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub inventory_id: String,
    pub movement_type: MovementType,
    /// Signed delta (negative for OUT).
    pub quantity: i64,
    pub reason: Option<String>,
    /// Order id for reservations and releases.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryAlert {
    pub id: String,
    pub inventory_id: String,
    pub alert_type: AlertType,
    pub message: String,
    pub is_resolved: bool,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Fields accepted by `create_or_update_inventory`. `None` keeps the
/// current value (or the default on insert).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFields {
    pub sku: Option<String>,
    pub quantity: Option<i64>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
    pub reorder_point: Option<i64>,
    pub cost: Option<Money>,
    pub location: Option<String>,
    pub supplier: Option<String>,
}

// =============================================================================
// Stock Levels
// =============================================================================

/// The three counters of an inventory row.
///
/// Construct through [`StockLevels::new`] so `available` is always
/// `quantity - reserved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockLevels {
    pub quantity: i64,
    pub reserved: i64,
    pub available: i64,
}

impl StockLevels {
    pub fn new(quantity: i64, reserved: i64) -> Self {
        Self {
            quantity,
            reserved,
            available: quantity - reserved,
        }
    }
}

/// Applies a movement to the levels.
///
/// `In` and `Transfer` add `qty`, `Out` subtracts it, `Adjustment` sets
/// quantity to `qty`. Reserved units are left untouched.
///
/// Besides quantity, `available` must also stay non-negative: a movement
/// that would leave fewer units on hand than are reserved is rejected, so
/// an `Adjustment` can never set quantity below `reserved`. Release the
/// holds first.
///
/// Returns the new levels and the signed delta to record on the movement.
///
/// ## Errors
/// - `Validation` if `qty` is not positive for In/Out/Transfer
/// - `NegativeStock` if quantity, or available after reservations, would drop
///   below zero
///
/// ```rust
/// use tienda_core::inventory::{apply_movement, MovementType, StockLevels};
///
/// let levels = StockLevels::new(10, 2);
/// let (after, delta) = apply_movement(levels, MovementType::Out, 4).unwrap();
/// assert_eq!(after, StockLevels::new(6, 2));
/// assert_eq!(delta, -4);
/// ```
pub fn apply_movement(
    levels: StockLevels,
    movement_type: MovementType,
    qty: i64,
) -> CoreResult<(StockLevels, i64)> {
    if movement_type != MovementType::Adjustment && qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    let new_quantity = match movement_type {
        MovementType::In | MovementType::Transfer => levels.quantity + qty,
        MovementType::Out => levels.quantity - qty,
        MovementType::Adjustment => qty,
    };

    if new_quantity < 0 {
        return Err(CoreError::NegativeStock {
            current: levels.quantity,
            resulting: new_quantity,
        });
    }

    let next = StockLevels::new(new_quantity, levels.reserved);
    if next.available < 0 {
        return Err(CoreError::NegativeStock {
            current: levels.available,
            resulting: next.available,
        });
    }

    Ok((next, new_quantity - levels.quantity))
}

/// Places a soft hold of `qty` units. Quantity is unchanged.
///
/// `item` identifies the row in the error (product id or SKU).
pub fn reserve(levels: StockLevels, item: &str, qty: i64) -> CoreResult<StockLevels> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    if levels.available < qty {
        return Err(CoreError::InsufficientStock {
            product_id: item.to_string(),
            available: levels.available,
            requested: qty,
        });
    }

    Ok(StockLevels::new(levels.quantity, levels.reserved + qty))
}

/// Releases a hold placed by [`reserve`].
pub fn release(levels: StockLevels, qty: i64) -> CoreResult<StockLevels> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    if levels.reserved < qty {
        return Err(ValidationError::Exceeds {
            field: "reserved".to_string(),
            held: levels.reserved,
            requested: qty,
        }
        .into());
    }

    Ok(StockLevels::new(levels.quantity, levels.reserved - qty))
}

/// Returns every alert condition that currently holds.
///
/// Conditions are independent, so several may fire at once (an empty row
/// with `reorder_point >= 0` raises both OUT_OF_STOCK and REORDER).
pub fn evaluate_alerts(available: i64, min_stock: i64, reorder_point: i64) -> Vec<AlertType> {
    let mut alerts = Vec::new();

    if available > 0 && available <= min_stock {
        alerts.push(AlertType::LowStock);
    }
    if available == 0 {
        alerts.push(AlertType::OutOfStock);
    }
    if available <= reorder_point {
        alerts.push(AlertType::Reorder);
    }

    alerts
}

// =============================================================================
// Reporting
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryStats {
    pub total_products: u64,
    pub total_quantity: i64,
    pub low_stock_count: u64,
    pub out_of_stock_count: u64,
    pub total_movements: u64,
}

impl InventoryStats {
    /// Aggregates over `rows`. Computed on demand, never stored.
    pub fn from_rows(rows: &[Inventory], total_movements: u64) -> Self {
        rows.iter().fold(
            InventoryStats {
                total_movements,
                ..Default::default()
            },
            |mut stats, row| {
                stats.total_products += 1;
                stats.total_quantity += row.quantity;
                if row.is_low_stock() {
                    stats.low_stock_count += 1;
                }
                if row.is_out_of_stock() {
                    stats.out_of_stock_count += 1;
                }
                stats
            },
        )
    }
}

/// Filter for the inventory report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFilter {
    /// Case-insensitive substring of sku, location or supplier.
    pub search: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub low_stock_only: bool,
    #[serde(default)]
    pub out_of_stock_only: bool,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

impl InventoryFilter {
    pub fn matches(&self, row: &Inventory) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = |field: Option<&str>| {
                field.is_some_and(|value| value.to_lowercase().contains(&needle))
            };
            if !hit(Some(&row.sku)) && !hit(row.location.as_deref()) && !hit(row.supplier.as_deref())
            {
                return false;
            }
        }

        if let Some(location) = &self.location {
            if row.location.as_deref() != Some(location.as_str()) {
                return false;
            }
        }

        if self.low_stock_only && !row.is_low_stock() {
            return false;
        }
        if self.out_of_stock_only && !row.is_out_of_stock() {
            return false;
        }

        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryReport {
    pub inventory: Vec<Inventory>,
    /// Stats cover every row matching the filter, not just this page.
    pub stats: InventoryStats,
    pub pagination: Pagination,
}

/// Filters, aggregates and paginates inventory rows.
///
/// `page`/`limit` are expected to be normalized already.
pub fn build_inventory_report(
    rows: Vec<Inventory>,
    total_movements: u64,
    filter: &InventoryFilter,
    page: u32,
    limit: u32,
) -> InventoryReport {
    let matching: Vec<Inventory> = rows.into_iter().filter(|row| filter.matches(row)).collect();
    let stats = InventoryStats::from_rows(&matching, total_movements);
    let pagination = Pagination::new(page, limit, matching.len() as u64);

    let inventory = matching
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(limit as usize)
        .collect();

    InventoryReport {
        inventory,
        stats,
        pagination,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
