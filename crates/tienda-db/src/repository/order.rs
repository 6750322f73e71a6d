//! # Order Repository
//!
//! Checkout and order reads.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  create_order_with_items(conn, order, items)            │
//! │                                                                         │
//! │  1. VALIDATE    header + lines (no database access)                    │
//! │  2. CHECK       for each product: live stock ≥ Σ requested             │
//! │                 └── any shortfall → InsufficientStock, nothing written │
//! │  3. INSERT      orders row                                             │
//! │  4. INSERT      order_items rows, seller snapshot from product owner   │
//! │  5. DECREMENT   products.stock per product                             │
//! │                                                                         │
//! │  All five steps share the caller's transaction. Stock is read inside   │
//! │  it, never from a pre-transaction read, so concurrent checkouts of     │
//! │  the last unit cannot both succeed.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::validation::{normalize_pagination, validate_new_order};
use tienda_core::{
    CoreError, NewOrder, NewOrderItem, Order, OrderItem, Page, Pagination, Product, Rate,
};

use super::product::PRODUCT_COLUMNS;

pub(crate) const ORDER_COLUMNS: &str = "id, user_id, customer_name, customer_email, \
    customer_phone, customer_address, total, status, payment_status, payment_method, \
    created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price, seller_id, \
    seller_name, seller_commission, created_at";

/// An order with its line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(sqlx::FromRow)]
struct SellerSnapshot {
    id: String,
    name: String,
    commission: Option<Rate>,
}

/// Repository for order reads.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets an order and its items, or `NotFound`.
    pub async fn get_with_items(&self, id: &str) -> DbResult<OrderWithItems> {
        let order = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;
        let items = self.get_items(id).await?;

        Ok(OrderWithItems { order, items })
    }

    /// Gets the items of an order in insertion order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY rowid"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists orders newest first.
    pub async fn list(&self, page: u32, limit: u32) -> DbResult<Page<Order>> {
        let (page, limit) = normalize_pagination(page, limit);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        let pagination = Pagination::new(page, limit, total as u64);

        let items = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(limit))
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page { items, pagination })
    }
}

// =============================================================================
// Compound Writes
// =============================================================================

/// Creates an order, its items and the stock decrements in the caller's
/// transaction.
///
/// Requested quantities are summed per product across lines before the
/// stock check, so two lines of 3 against a stock of 5 fail.
///
/// ## Errors
/// - `Validation` for a bad header/line or `InsufficientStock`
/// - `NotFound` if a line references an unknown product
pub async fn create_order_with_items(
    conn: &mut SqliteConnection,
    order: NewOrder,
    items: Vec<NewOrderItem>,
) -> DbResult<OrderWithItems> {
    validate_new_order(&order, &items)?;

    // Per-product demand, in first-seen line order
    let mut demand: Vec<(String, i64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for item in &items {
        match index.get(item.product_id.as_str()) {
            Some(&i) => demand[i].1 += item.quantity,
            None => {
                index.insert(item.product_id.as_str(), demand.len());
                demand.push((item.product_id.clone(), item.quantity));
            }
        }
    }

    let mut products: HashMap<String, Product> = HashMap::with_capacity(demand.len());
    for (product_id, requested) in &demand {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

        if !product.can_fulfil(*requested) {
            debug!(
                product_id = %product_id,
                available = product.stock,
                requested,
                "Checkout rejected, insufficient stock"
            );
            return Err(CoreError::InsufficientStock {
                product_id: product_id.clone(),
                available: product.stock,
                requested: *requested,
            }
            .into());
        }

        products.insert(product_id.clone(), product);
    }

    let now = Utc::now();
    let created = Order {
        id: Uuid::new_v4().to_string(),
        user_id: order.user_id,
        customer_name: order.customer_name,
        customer_email: order.customer_email,
        customer_phone: order.customer_phone,
        customer_address: order.customer_address,
        total: order.total,
        status: order.status,
        payment_status: order.payment_status,
        payment_method: order.payment_method,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, customer_name, customer_email, customer_phone, customer_address,
            total, status, payment_status, payment_method, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&created.id)
    .bind(&created.user_id)
    .bind(&created.customer_name)
    .bind(&created.customer_email)
    .bind(&created.customer_phone)
    .bind(&created.customer_address)
    .bind(created.total)
    .bind(created.status)
    .bind(created.payment_status)
    .bind(&created.payment_method)
    .bind(created.created_at)
    .bind(created.updated_at)
    .execute(&mut *conn)
    .await?;

    let mut sellers: HashMap<String, Option<SellerSnapshot>> = HashMap::new();
    let mut created_items = Vec::with_capacity(items.len());

    for item in items {
        let owner = products
            .get(&item.product_id)
            .and_then(|p| p.user_id.clone());

        let seller = match owner {
            Some(owner_id) => {
                if !sellers.contains_key(&owner_id) {
                    let snapshot = sqlx::query_as::<_, SellerSnapshot>(
                        "SELECT id, name, commission FROM users WHERE id = ?",
                    )
                    .bind(&owner_id)
                    .fetch_optional(&mut *conn)
                    .await?;
                    sellers.insert(owner_id.clone(), snapshot);
                }
                sellers.get(&owner_id).and_then(Option::as_ref)
            }
            None => None,
        };

        let order_item = OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: created.id.clone(),
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
            seller_id: seller.map(|s| s.id.clone()),
            seller_name: seller.map(|s| s.name.clone()),
            seller_commission: seller.and_then(|s| s.commission),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, quantity, price,
                seller_id, seller_name, seller_commission, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order_item.id)
        .bind(&order_item.order_id)
        .bind(&order_item.product_id)
        .bind(order_item.quantity)
        .bind(order_item.price)
        .bind(&order_item.seller_id)
        .bind(&order_item.seller_name)
        .bind(order_item.seller_commission)
        .bind(order_item.created_at)
        .execute(&mut *conn)
        .await?;

        created_items.push(order_item);
    }

    for (product_id, requested) in &demand {
        sqlx::query("UPDATE products SET stock = stock - ?, updated_at = ? WHERE id = ?")
            .bind(*requested)
            .bind(now)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
    }

    info!(
        order_id = %created.id,
        items = created_items.len(),
        total = %created.total,
        "Order created"
    );

    Ok(OrderWithItems {
        order: created,
        items: created_items,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{checkout, count, line, product, seller, test_db};
    use tienda_core::OrderStatus;

    #[tokio::test]
    async fn test_checkout_decrements_stock_and_snapshots_seller() {
        let db = test_db().await;
        let owner = seller(&db, "ana@example.com").await;
        let widget = product(&db, Some(&owner.id), "Widget", 1_000, 5).await;

        let created = {
            let mut conn = db.pool().acquire().await.unwrap();
            create_order_with_items(
                &mut conn,
                checkout(OrderStatus::Pending, 3_000),
                vec![line(&widget, 3)],
            )
            .await
            .unwrap()
        };

        assert_eq!(created.items.len(), 1);
        let item = &created.items[0];
        assert_eq!(item.seller_id.as_deref(), Some(owner.id.as_str()));
        assert_eq!(item.seller_name.as_deref(), Some("Ana Vendedora"));
        assert_eq!(item.seller_commission, owner.commission);

        let reloaded = db.products().get_by_id(&widget.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stock, 2);

        let fetched = db.orders().get_with_items(&created.order.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let db = test_db().await;
        let plenty = product(&db, None, "Plenty", 500, 100).await;
        let scarce = product(&db, None, "Scarce", 500, 5).await;

        let result = {
            let mut conn = db.pool().acquire().await.unwrap();
            create_order_with_items(
                &mut conn,
                checkout(OrderStatus::Pending, 5_000),
                // 3 + 3 against a stock of 5: per-line checks would pass
                vec![line(&plenty, 4), line(&scarce, 3), line(&scarce, 3)],
            )
            .await
        };

        match result {
            Err(DbError::Validation(CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            })) => {
                assert_eq!(product_id, scarce.id);
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(count(&db, "orders").await, 0);
        assert_eq!(count(&db, "order_items").await, 0);
        let plenty = db.products().get_by_id(&plenty.id).await.unwrap().unwrap();
        assert_eq!(plenty.stock, 100);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = create_order_with_items(
            &mut conn,
            checkout(OrderStatus::Pending, 100),
            vec![NewOrderItem {
                product_id: "missing".to_string(),
                quantity: 1,
                price: tienda_core::Money::from_cents(100),
            }],
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_empty_checkout_is_rejected() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = create_order_with_items(&mut conn, checkout(OrderStatus::Pending, 0), Vec::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_orders_paginates() {
        let db = test_db().await;
        let widget = product(&db, None, "Widget", 100, 10).await;
        for _ in 0..3 {
            let mut conn = db.pool().acquire().await.unwrap();
            create_order_with_items(
                &mut conn,
                checkout(OrderStatus::Completed, 100),
                vec![line(&widget, 1)],
            )
            .await
            .unwrap();
        }

        let page = db.orders().list(2, 2).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.total_pages, 2);
    }
}
