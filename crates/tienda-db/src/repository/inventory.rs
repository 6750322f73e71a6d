//! # Inventory Repository
//!
//! Persistence for the stock ledger.
//!
//! ## Movement Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │        record_movement / reserve_stock / release_stock (conn)           │
//! │                                                                         │
//! │  1. LOAD      inventory row                     missing → NotFound     │
//! │  2. COMPUTE   new levels (tienda_core::inventory)                      │
//! │               └── rejected → error, nothing written                    │
//! │  3. UPDATE    quantity / reserved / available                          │
//! │  4. INSERT    inventory_movements (signed delta, append-only)          │
//! │  5. INSERT    one inventory_alerts row per condition that holds        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Alerts are not deduplicated: a row that stays low raises a new
//! LOW_STOCK alert on every movement until someone resolves them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::inventory::{
    apply_movement, build_inventory_report, evaluate_alerts, release, reserve, AlertType,
    Inventory, InventoryAlert, InventoryFields, InventoryFilter, InventoryMovement,
    InventoryReport, MovementType, StockLevels,
};
use tienda_core::validation::{normalize_pagination, validate_required, validate_sku};
use tienda_core::{CoreError, ValidationError};

const INVENTORY_COLUMNS: &str = "id, product_id, sku, quantity, reserved, available, \
    min_stock, max_stock, reorder_point, cost, location, supplier, created_at, updated_at";

const MOVEMENT_COLUMNS: &str =
    "id, inventory_id, movement_type, quantity, reason, reference, created_at";

const ALERT_COLUMNS: &str =
    "id, inventory_id, alert_type, message, is_resolved, resolved_at, resolved_by, created_at";

/// Page size used by the inventory report when the filter leaves it unset.
const DEFAULT_REPORT_LIMIT: u32 = 20;

/// Result of one ledger mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementOutcome {
    pub inventory: Inventory,
    pub movement: InventoryMovement,
    pub alerts: Vec<InventoryAlert>,
}

// =============================================================================
// Reads
// =============================================================================

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Inventory>> {
        let row = sqlx::query_as::<_, Inventory>(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_by_product(&self, product_id: &str) -> DbResult<Option<Inventory>> {
        let row = sqlx::query_as::<_, Inventory>(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE product_id = ?"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Movements of one row, oldest first.
    pub async fn list_movements(&self, inventory_id: &str) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as::<_, InventoryMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
             WHERE inventory_id = ? ORDER BY created_at, rowid"
        ))
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Alerts newest first, optionally only the open ones.
    pub async fn list_alerts(&self, only_unresolved: bool) -> DbResult<Vec<InventoryAlert>> {
        let filter = if only_unresolved {
            "WHERE is_resolved = 0"
        } else {
            ""
        };

        let alerts = sqlx::query_as::<_, InventoryAlert>(&format!(
            "SELECT {ALERT_COLUMNS} FROM inventory_alerts {filter} \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(alerts)
    }

    /// Marks an alert resolved. Resolving twice keeps the first resolution.
    pub async fn resolve_alert(&self, alert_id: &str, resolved_by: &str) -> DbResult<InventoryAlert> {
        validate_required("resolved_by", resolved_by)?;

        sqlx::query(
            "UPDATE inventory_alerts SET is_resolved = 1, resolved_at = ?, resolved_by = ? \
             WHERE id = ? AND is_resolved = 0",
        )
        .bind(Utc::now())
        .bind(resolved_by)
        .bind(alert_id)
        .execute(&self.pool)
        .await?;

        let alert = sqlx::query_as::<_, InventoryAlert>(&format!(
            "SELECT {ALERT_COLUMNS} FROM inventory_alerts WHERE id = ?"
        ))
        .bind(alert_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("InventoryAlert", alert_id))?;

        info!(alert_id, resolved_by, "Inventory alert resolved");
        Ok(alert)
    }

    /// Filtered, paginated inventory with stats over every matching row.
    pub async fn inventory_report(&self, filter: &InventoryFilter) -> DbResult<InventoryReport> {
        let rows = sqlx::query_as::<_, Inventory>(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory ORDER BY sku"
        ))
        .fetch_all(&self.pool)
        .await?;

        let total_movements: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_movements")
            .fetch_one(&self.pool)
            .await?;

        let limit = if filter.limit == 0 {
            DEFAULT_REPORT_LIMIT
        } else {
            filter.limit
        };
        let (page, limit) = normalize_pagination(filter.page, limit);

        Ok(build_inventory_report(
            rows,
            total_movements as u64,
            filter,
            page,
            limit,
        ))
    }
}

// =============================================================================
// Compound Writes
// =============================================================================

async fn load(conn: &mut SqliteConnection, inventory_id: &str) -> DbResult<Inventory> {
    sqlx::query_as::<_, Inventory>(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE id = ?"
    ))
    .bind(inventory_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Inventory", inventory_id))
}

async fn persist_levels(
    conn: &mut SqliteConnection,
    inventory: &mut Inventory,
    levels: StockLevels,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE inventory SET quantity = ?, reserved = ?, available = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(levels.quantity)
    .bind(levels.reserved)
    .bind(levels.available)
    .bind(now)
    .bind(&inventory.id)
    .execute(&mut *conn)
    .await?;

    inventory.quantity = levels.quantity;
    inventory.reserved = levels.reserved;
    inventory.available = levels.available;
    inventory.updated_at = now;
    Ok(())
}

async fn append_movement(
    conn: &mut SqliteConnection,
    inventory_id: &str,
    movement_type: MovementType,
    delta: i64,
    reason: Option<String>,
    reference: Option<String>,
    now: DateTime<Utc>,
) -> DbResult<InventoryMovement> {
    let movement = InventoryMovement {
        id: Uuid::new_v4().to_string(),
        inventory_id: inventory_id.to_string(),
        movement_type,
        quantity: delta,
        reason,
        reference,
        created_at: now,
    };

    sqlx::query(
        "INSERT INTO inventory_movements \
         (id, inventory_id, movement_type, quantity, reason, reference, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&movement.id)
    .bind(&movement.inventory_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(&movement.reason)
    .bind(&movement.reference)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(movement)
}

async fn raise_alerts(
    conn: &mut SqliteConnection,
    inventory: &Inventory,
    now: DateTime<Utc>,
) -> DbResult<Vec<InventoryAlert>> {
    let conditions = evaluate_alerts(inventory.available, inventory.min_stock, inventory.reorder_point);
    let mut alerts = Vec::with_capacity(conditions.len());

    for alert_type in conditions {
        let threshold = match alert_type {
            AlertType::LowStock => inventory.min_stock,
            AlertType::OutOfStock => 0,
            AlertType::Reorder => inventory.reorder_point,
        };

        let alert = InventoryAlert {
            id: Uuid::new_v4().to_string(),
            inventory_id: inventory.id.clone(),
            alert_type,
            message: alert_type.message(&inventory.sku, inventory.available, threshold),
            is_resolved: false,
            resolved_at: None,
            resolved_by: None,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO inventory_alerts \
             (id, inventory_id, alert_type, message, is_resolved, created_at) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&alert.id)
        .bind(&alert.inventory_id)
        .bind(alert.alert_type)
        .bind(&alert.message)
        .bind(alert.created_at)
        .execute(&mut *conn)
        .await?;

        warn!(
            inventory_id = %inventory.id,
            sku = %inventory.sku,
            alert = alert_type.as_str(),
            available = inventory.available,
            "Inventory alert raised"
        );
        alerts.push(alert);
    }

    Ok(alerts)
}

/// Persists new levels, appends the movement and raises alerts.
async fn commit_levels(
    conn: &mut SqliteConnection,
    mut inventory: Inventory,
    levels: StockLevels,
    movement_type: MovementType,
    delta: i64,
    reason: Option<String>,
    reference: Option<String>,
) -> DbResult<MovementOutcome> {
    let now = Utc::now();

    persist_levels(conn, &mut inventory, levels, now).await?;
    let movement =
        append_movement(conn, &inventory.id, movement_type, delta, reason, reference, now).await?;
    let alerts = raise_alerts(conn, &inventory, now).await?;

    debug!(
        inventory_id = %inventory.id,
        movement = movement_type.as_str(),
        delta,
        quantity = inventory.quantity,
        reserved = inventory.reserved,
        available = inventory.available,
        "Inventory movement recorded"
    );

    Ok(MovementOutcome {
        inventory,
        movement,
        alerts,
    })
}

/// Applies a stock movement to one inventory row.
///
/// `qty` is the amount moved for IN/OUT/TRANSFER and the new absolute
/// quantity for ADJUSTMENT. The movement records the signed delta.
///
/// ## Errors
/// - `NotFound` if the row does not exist
/// - `Validation` (`NegativeStock`) if quantity or available would go negative
pub async fn record_movement(
    conn: &mut SqliteConnection,
    inventory_id: &str,
    movement_type: MovementType,
    qty: i64,
    reason: Option<String>,
    reference: Option<String>,
) -> DbResult<MovementOutcome> {
    let inventory = load(conn, inventory_id).await?;
    let (levels, delta) = apply_movement(inventory.levels(), movement_type, qty)?;

    commit_levels(conn, inventory, levels, movement_type, delta, reason, reference).await
}

/// Holds `qty` units for an order. Quantity on hand is unchanged.
pub async fn reserve_stock(
    conn: &mut SqliteConnection,
    inventory_id: &str,
    qty: i64,
    order_id: &str,
) -> DbResult<MovementOutcome> {
    let inventory = load(conn, inventory_id).await?;
    let levels = reserve(inventory.levels(), inventory.label(), qty)?;

    commit_levels(
        conn,
        inventory,
        levels,
        MovementType::Out,
        -qty,
        Some("Reserved for order".to_string()),
        Some(order_id.to_string()),
    )
    .await
}

/// Returns `qty` held units to available stock.
pub async fn release_stock(
    conn: &mut SqliteConnection,
    inventory_id: &str,
    qty: i64,
    order_id: &str,
) -> DbResult<MovementOutcome> {
    let inventory = load(conn, inventory_id).await?;
    let levels = release(inventory.levels(), qty)?;

    commit_levels(
        conn,
        inventory,
        levels,
        MovementType::In,
        qty,
        Some("Released from order".to_string()),
        Some(order_id.to_string()),
    )
    .await
}

/// Creates the product's inventory row, or updates the existing one.
///
/// Quantity never changes silently: a new row with stock records an IN
/// "Initial stock" movement, a changed quantity records an ADJUSTMENT.
/// Either movement is followed by alert evaluation.
/// Without a SKU, a new row gets `INV-{product_id}-{unix millis}`.
pub async fn create_or_update_inventory(
    conn: &mut SqliteConnection,
    product_id: &str,
    fields: InventoryFields,
) -> DbResult<Inventory> {
    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(CoreError::ProductNotFound(product_id.to_string()).into());
    }

    if let Some(sku) = &fields.sku {
        validate_sku(sku)?;
    }
    for (field, value) in [
        ("quantity", fields.quantity),
        ("min_stock", fields.min_stock),
        ("max_stock", fields.max_stock),
        ("reorder_point", fields.reorder_point),
    ] {
        if value.is_some_and(|v| v < 0) {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
    }

    let existing = sqlx::query_as::<_, Inventory>(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE product_id = ?"
    ))
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    let now = Utc::now();

    let Some(mut row) = existing else {
        let quantity = fields.quantity.unwrap_or(0);
        let levels = StockLevels::new(quantity, 0);
        let row = Inventory {
            id: Uuid::new_v4().to_string(),
            product_id: Some(product_id.to_string()),
            sku: fields
                .sku
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| format!("INV-{product_id}-{}", now.timestamp_millis())),
            quantity: levels.quantity,
            reserved: levels.reserved,
            available: levels.available,
            min_stock: fields.min_stock.unwrap_or(0),
            max_stock: fields.max_stock,
            reorder_point: fields.reorder_point.unwrap_or(0),
            cost: fields.cost,
            location: fields.location,
            supplier: fields.supplier,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO inventory (
                id, product_id, sku, quantity, reserved, available, min_stock, max_stock,
                reorder_point, cost, location, supplier, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.product_id)
        .bind(&row.sku)
        .bind(row.quantity)
        .bind(row.reserved)
        .bind(row.available)
        .bind(row.min_stock)
        .bind(row.max_stock)
        .bind(row.reorder_point)
        .bind(row.cost)
        .bind(&row.location)
        .bind(&row.supplier)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await?;

        if quantity > 0 {
            append_movement(
                conn,
                &row.id,
                MovementType::In,
                quantity,
                Some("Initial stock".to_string()),
                None,
                now,
            )
            .await?;
            raise_alerts(conn, &row, now).await?;
        }

        info!(inventory_id = %row.id, product_id, sku = %row.sku, quantity, "Inventory created");
        return Ok(row);
    };

    if let Some(sku) = fields.sku {
        row.sku = sku.trim().to_string();
    }
    if let Some(min_stock) = fields.min_stock {
        row.min_stock = min_stock;
    }
    if fields.max_stock.is_some() {
        row.max_stock = fields.max_stock;
    }
    if let Some(reorder_point) = fields.reorder_point {
        row.reorder_point = reorder_point;
    }
    if fields.cost.is_some() {
        row.cost = fields.cost;
    }
    if fields.location.is_some() {
        row.location = fields.location;
    }
    if fields.supplier.is_some() {
        row.supplier = fields.supplier;
    }

    let adjustment = match fields.quantity {
        Some(quantity) if quantity != row.quantity => {
            Some(apply_movement(row.levels(), MovementType::Adjustment, quantity)?)
        }
        _ => None,
    };

    row.updated_at = now;
    sqlx::query(
        "UPDATE inventory SET sku = ?, min_stock = ?, max_stock = ?, reorder_point = ?, \
         cost = ?, location = ?, supplier = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&row.sku)
    .bind(row.min_stock)
    .bind(row.max_stock)
    .bind(row.reorder_point)
    .bind(row.cost)
    .bind(&row.location)
    .bind(&row.supplier)
    .bind(row.updated_at)
    .bind(&row.id)
    .execute(&mut *conn)
    .await?;

    if let Some((levels, delta)) = adjustment {
        let outcome = commit_levels(
            conn,
            row,
            levels,
            MovementType::Adjustment,
            delta,
            Some("Inventory update".to_string()),
            None,
        )
        .await?;
        row = outcome.inventory;
    }

    debug!(inventory_id = %row.id, product_id, "Inventory updated");
    Ok(row)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pool::Database;
    use crate::repository::fixtures::{count, product, test_db};
    use tienda_core::Money;

    async fn stocked(db: &Database, quantity: i64, min_stock: i64, reorder_point: i64) -> Inventory {
        let widget = product(db, None, "Widget", 1_000, 0).await;
        let mut conn = db.pool().acquire().await.unwrap();
        create_or_update_inventory(
            &mut conn,
            &widget.id,
            InventoryFields {
                quantity: Some(quantity),
                min_stock: Some(min_stock),
                reorder_point: Some(reorder_point),
                cost: Some(Money::from_cents(400)),
                location: Some("Madrid".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_generates_sku_and_initial_movement() {
        let db = test_db().await;
        let row = stocked(&db, 50, 5, 10).await;

        let product_id = row.product_id.clone().unwrap();
        assert!(row.sku.starts_with(&format!("INV-{product_id}-")));
        assert_eq!(row.available, 50);

        let movements = db.inventory().list_movements(&row.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::In);
        assert_eq!(movements[0].quantity, 50);
        assert_eq!(movements[0].reason.as_deref(), Some("Initial stock"));
    }

    #[tokio::test]
    async fn test_initial_stock_below_minimum_raises_low_stock() {
        let db = test_db().await;
        let row = stocked(&db, 3, 5, 0).await;

        let movements = db.inventory().list_movements(&row.id).await.unwrap();
        assert_eq!(movements.len(), 1);

        let alerts = db.inventory().list_alerts(true).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::LowStock);
        assert_eq!(alerts[0].inventory_id, row.id);

        let empty = stocked(&db, 0, 5, 0).await;
        let alerts = db.inventory().list_alerts(true).await.unwrap();
        assert!(alerts.iter().all(|a| a.inventory_id != empty.id));
    }

    #[tokio::test]
    async fn test_update_records_adjustment_delta() {
        let db = test_db().await;
        let row = stocked(&db, 50, 5, 10).await;
        let product_id = row.product_id.clone().unwrap();

        let updated = {
            let mut conn = db.pool().acquire().await.unwrap();
            create_or_update_inventory(
                &mut conn,
                &product_id,
                InventoryFields {
                    quantity: Some(42),
                    supplier: Some("Acme".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
        };

        assert_eq!(updated.id, row.id);
        assert_eq!(updated.quantity, 42);
        assert_eq!(updated.available, 42);
        assert_eq!(updated.supplier.as_deref(), Some("Acme"));
        assert_eq!(updated.location.as_deref(), Some("Madrid"));

        let movements = db.inventory().list_movements(&row.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[1].movement_type, MovementType::Adjustment);
        assert_eq!(movements[1].quantity, -8);
    }

    #[tokio::test]
    async fn test_out_movement_to_zero_raises_alerts() {
        let db = test_db().await;
        let row = stocked(&db, 3, 5, 10).await;

        let outcome = {
            let mut conn = db.pool().acquire().await.unwrap();
            record_movement(
                &mut conn,
                &row.id,
                MovementType::Out,
                3,
                Some("Damaged".to_string()),
                None,
            )
            .await
            .unwrap()
        };

        assert_eq!(outcome.inventory.available, 0);
        assert_eq!(outcome.movement.quantity, -3);
        let kinds: Vec<AlertType> = outcome.alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(kinds, vec![AlertType::OutOfStock, AlertType::Reorder]);
        // Two more from the initial stock of 3
        assert_eq!(db.inventory().list_alerts(true).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_rejected_movement_leaves_no_trace() {
        let db = test_db().await;
        let row = stocked(&db, 3, 0, 0).await;

        let err = {
            let mut conn = db.pool().acquire().await.unwrap();
            record_movement(&mut conn, &row.id, MovementType::Out, 4, None, None)
                .await
                .unwrap_err()
        };

        assert!(matches!(err, DbError::Validation(CoreError::NegativeStock { .. })));
        let reloaded = db.inventory().get_by_id(&row.id).await.unwrap().unwrap();
        assert_eq!(reloaded.quantity, 3);
        assert_eq!(count(&db, "inventory_movements").await, 1);
    }

    #[tokio::test]
    async fn test_reserve_and_release_keep_quantity() {
        let db = test_db().await;
        let row = stocked(&db, 10, 2, 0).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let reserved = reserve_stock(&mut conn, &row.id, 7, "order-1").await.unwrap();
        assert_eq!(reserved.inventory.quantity, 10);
        assert_eq!(reserved.inventory.reserved, 7);
        assert_eq!(reserved.inventory.available, 3);
        assert_eq!(reserved.movement.movement_type, MovementType::Out);
        assert_eq!(reserved.movement.quantity, -7);
        assert_eq!(reserved.movement.reference.as_deref(), Some("order-1"));

        let err = reserve_stock(&mut conn, &row.id, 4, "order-2").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(CoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            })
        ));

        let released = release_stock(&mut conn, &row.id, 7, "order-1").await.unwrap();
        assert_eq!(released.inventory.available, 10);
        assert_eq!(released.movement.movement_type, MovementType::In);
        assert_eq!(released.movement.quantity, 7);

        let err = release_stock(&mut conn, &row.id, 1, "order-1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_low_stock_alerts_are_not_deduplicated() {
        let db = test_db().await;
        let row = stocked(&db, 9, 8, 0).await;
        {
            let mut conn = db.pool().acquire().await.unwrap();
            for _ in 0..2 {
                record_movement(&mut conn, &row.id, MovementType::Out, 1, None, None)
                    .await
                    .unwrap();
            }
        }

        let open = db.inventory().list_alerts(true).await.unwrap();
        assert_eq!(open.len(), 2);
        assert!(open.iter().all(|a| a.alert_type == AlertType::LowStock));

        let resolved = db
            .inventory()
            .resolve_alert(&open[0].id, "admin@example.com")
            .await
            .unwrap();
        assert!(resolved.is_resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("admin@example.com"));
        assert_eq!(db.inventory().list_alerts(true).await.unwrap().len(), 1);
        assert_eq!(db.inventory().list_alerts(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_product_and_row() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = create_or_update_inventory(&mut conn, "ghost", InventoryFields::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = record_movement(&mut conn, "ghost", MovementType::In, 1, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_inventory_report_filters_and_counts() {
        let db = test_db().await;
        stocked(&db, 0, 5, 0).await;
        stocked(&db, 3, 5, 0).await;
        stocked(&db, 50, 5, 0).await;

        let all = db
            .inventory()
            .inventory_report(&InventoryFilter::default())
            .await
            .unwrap();
        assert_eq!(all.stats.total_products, 3);
        assert_eq!(all.stats.total_quantity, 53);
        assert_eq!(all.stats.low_stock_count, 1);
        assert_eq!(all.stats.out_of_stock_count, 1);
        // Initial stock movements for the two non-empty rows
        assert_eq!(all.stats.total_movements, 2);
        assert_eq!(all.pagination.limit, DEFAULT_REPORT_LIMIT);

        let low = db
            .inventory()
            .inventory_report(&InventoryFilter {
                low_stock_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low.inventory.len(), 1);
        assert_eq!(low.inventory[0].quantity, 3);

        let nowhere = db
            .inventory()
            .inventory_report(&InventoryFilter {
                search: Some("barcelona".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(nowhere.inventory.is_empty());
    }
}
