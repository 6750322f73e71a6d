//! # Report Repository
//!
//! Loads the inputs of the report builders in `tienda_core::report`.
//!
//! ## Loader Queries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  orders (scope + period) ─────────────────────────► header per order   │
//! │                                                                         │
//! │  order_items ⨝ orders (same scope + period)                            │
//! │     ⟕ products   name, categories, supplier_price, margin              │
//! │     ⟕ inventory  cost                                                  │
//! │  ──────────────────────────────────────────────────► lines per order   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Two queries per report regardless of order count. Products may be gone
//! (deleted after an unsold order kept its header), hence the outer joins.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::debug;

use super::order::ORDER_COLUMNS;
use super::placeholders;
use crate::error::DbResult;
use tienda_core::cost::CostSources;
use tienda_core::report::{ReportLine, ReportOrder, ReportPeriod};
use tienda_core::{Money, Order, OrderStatus, PaymentStatus, Rate, User};

/// Which orders a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Payment status PAID (financial report).
    Paid,
    /// Status CONFIRMED or COMPLETED (sales and user reports).
    Completed,
}

impl OrderScope {
    /// WHERE fragment over alias `o` and the values it binds, after the two
    /// period bounds.
    fn predicate(&self) -> (String, Vec<&'static str>) {
        match self {
            OrderScope::Paid => (
                "o.payment_status = ?".to_string(),
                vec![PaymentStatus::Paid.as_str()],
            ),
            OrderScope::Completed => {
                let statuses: Vec<&'static str> =
                    OrderStatus::COMPLETED.iter().map(|s| s.as_str()).collect();
                (
                    format!("o.status IN ({})", placeholders(statuses.len())),
                    statuses,
                )
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    order_id: String,
    product_id: String,
    product_name: String,
    categories: String,
    quantity: i64,
    unit_price: Money,
    inventory_cost: Option<Money>,
    supplier_price: Option<Money>,
    margin: Option<Rate>,
}

impl LineRow {
    fn into_line(self) -> (String, ReportLine) {
        let line = ReportLine {
            product_id: self.product_id,
            product_name: self.product_name,
            categories: self.categories,
            quantity: self.quantity,
            unit_price: self.unit_price,
            cost_sources: CostSources {
                inventory_unit_cost: self.inventory_cost,
                supplier_price: self.supplier_price,
                margin: self.margin,
            },
        };
        (self.order_id, line)
    }
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Paid orders created in `period`, with lines.
    pub async fn paid_orders(&self, period: ReportPeriod) -> DbResult<Vec<ReportOrder>> {
        self.load_orders(OrderScope::Paid, period).await
    }

    /// Completed orders created in `period`, with lines.
    pub async fn completed_orders(&self, period: ReportPeriod) -> DbResult<Vec<ReportOrder>> {
        self.load_orders(OrderScope::Completed, period).await
    }

    pub async fn load_orders(
        &self,
        scope: OrderScope,
        period: ReportPeriod,
    ) -> DbResult<Vec<ReportOrder>> {
        let (predicate, values) = scope.predicate();
        let window = "o.created_at >= ? AND o.created_at <= ?";

        let orders_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE {window} AND {predicate} \
             ORDER BY o.created_at, o.id"
        );
        let mut orders_query = sqlx::query_as::<_, Order>(&orders_sql)
            .bind(period.start)
            .bind(period.end);
        for value in &values {
            orders_query = orders_query.bind(*value);
        }
        let orders = orders_query.fetch_all(&self.pool).await?;

        let lines_sql = format!(
            r#"
            SELECT
                oi.order_id,
                oi.product_id,
                COALESCE(p.name, 'Deleted product') AS product_name,
                COALESCE(p.categories, '') AS categories,
                oi.quantity,
                oi.price AS unit_price,
                i.cost AS inventory_cost,
                p.supplier_price,
                p.margin
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            LEFT JOIN products p ON p.id = oi.product_id
            LEFT JOIN inventory i ON i.product_id = oi.product_id
            WHERE {window} AND {predicate}
            ORDER BY oi.rowid
            "#
        );
        let mut lines_query = sqlx::query_as::<_, LineRow>(&lines_sql)
            .bind(period.start)
            .bind(period.end);
        for value in &values {
            lines_query = lines_query.bind(*value);
        }
        let line_rows = lines_query.fetch_all(&self.pool).await?;

        let mut lines_by_order: HashMap<String, Vec<ReportLine>> = HashMap::new();
        let line_count = line_rows.len();
        for row in line_rows {
            let (order_id, line) = row.into_line();
            lines_by_order.entry(order_id).or_default().push(line);
        }

        let loaded: Vec<ReportOrder> = orders
            .into_iter()
            .map(|order| ReportOrder {
                lines: lines_by_order.remove(&order.id).unwrap_or_default(),
                id: order.id,
                user_id: order.user_id,
                total: order.total,
                status: order.status,
                payment_status: order.payment_status,
                payment_method: order.payment_method,
                created_at: order.created_at,
            })
            .collect();

        debug!(
            ?scope,
            orders = loaded.len(),
            lines = line_count,
            start = %period.start,
            end = %period.end,
            "Loaded report orders"
        );
        Ok(loaded)
    }

    /// Every user, oldest signup first.
    pub async fn users(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, commission, created_at FROM users \
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Completed orders of any date, for lifetime customer spend.
    pub async fn completed_order_headers(&self) -> DbResult<Vec<Order>> {
        let statuses = OrderStatus::COMPLETED;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status IN ({}) ORDER BY created_at, id",
            placeholders(statuses.len())
        );
        let mut query = sqlx::query_as::<_, Order>(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }

        Ok(query.fetch_all(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::fixtures::{checkout, line, product, test_db};
    use crate::repository::inventory::create_or_update_inventory;
    use crate::repository::order::create_order_with_items;
    use chrono::{Duration, Utc};
    use tienda_core::inventory::InventoryFields;

    fn around_now() -> ReportPeriod {
        let now = Utc::now();
        ReportPeriod::new(now - Duration::hours(1), now + Duration::hours(1))
    }

    async fn place(
        db: &Database,
        status: OrderStatus,
        payment: PaymentStatus,
        items: Vec<tienda_core::NewOrderItem>,
    ) {
        let mut conn = db.pool().acquire().await.unwrap();
        let mut order = checkout(status, 1_000);
        order.payment_status = payment;
        create_order_with_items(&mut conn, order, items).await.unwrap();
    }

    #[tokio::test]
    async fn test_paid_scope_joins_cost_sources() {
        let db = test_db().await;
        let widget = product(&db, None, "Widget", 1_000, 10).await;
        {
            let mut conn = db.pool().acquire().await.unwrap();
            create_or_update_inventory(
                &mut conn,
                &widget.id,
                InventoryFields {
                    cost: Some(Money::from_cents(600)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        place(&db, OrderStatus::Pending, PaymentStatus::Paid, vec![line(&widget, 2)]).await;
        place(&db, OrderStatus::Completed, PaymentStatus::Pending, vec![line(&widget, 1)]).await;

        let paid = db.reports().paid_orders(around_now()).await.unwrap();
        assert_eq!(paid.len(), 1);
        let order = &paid[0];
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].quantity, 2);
        assert_eq!(order.lines[0].product_name, "Widget");
        assert_eq!(
            order.lines[0].cost_sources.inventory_unit_cost,
            Some(Money::from_cents(600))
        );

        let completed = db.reports().completed_orders(around_now()).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_period_excludes_other_dates() {
        let db = test_db().await;
        let widget = product(&db, None, "Widget", 1_000, 10).await;
        place(&db, OrderStatus::Completed, PaymentStatus::Paid, vec![line(&widget, 1)]).await;

        let last_year = ReportPeriod::new(
            Utc::now() - Duration::days(400),
            Utc::now() - Duration::days(300),
        );
        assert!(db.reports().paid_orders(last_year).await.unwrap().is_empty());
        assert_eq!(db.reports().completed_order_headers().await.unwrap().len(), 1);
    }
}
