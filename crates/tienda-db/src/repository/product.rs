//! # Product Repository
//!
//! Catalog reads and the product compound writes.
//!
//! ## Cascading Delete
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              delete_product_completely(conn, product_id)                │
//! │                                                                         │
//! │  0. product exists?                        no  → NotFound              │
//! │  1. items in CONFIRMED/COMPLETED orders?   yes → Blocked, untouched    │
//! │  2. DELETE cart_items                                                  │
//! │  3. DELETE product_ratings                                             │
//! │  4. DELETE order_items of non-completed orders                         │
//! │  5. DELETE product_images                                              │
//! │  6. DELETE products                 (inventory.product_id → NULL)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Sold history is never deleted: the blocking check runs before the first
//! DELETE, and `order_items.product_id` has no ON DELETE action as a
//! second line of defence.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::placeholders;
use crate::error::{DbError, DbResult};
use tienda_core::validation::{normalize_pagination, validate_new_product};
use tienda_core::{
    CoreError, NewProduct, NewProductImage, OrderStatus, Page, Pagination, Product, ProductImage,
};

pub(crate) const PRODUCT_COLUMNS: &str = "id, user_id, name, description, price, stock, \
    categories, supplier_price, margin, is_active, created_at, updated_at";

/// A product with its images in position order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithImages {
    pub product: Product,
    pub images: Vec<ProductImage>,
}

/// Rows removed by [`delete_product_completely`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDeletion {
    pub cart_items: u64,
    pub ratings: u64,
    pub order_items: u64,
    pub images: u64,
}

/// Repository for catalog reads.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn get_images(&self, product_id: &str) -> DbResult<Vec<ProductImage>> {
        let images = sqlx::query_as::<_, ProductImage>(
            "SELECT id, product_id, url, alt, position FROM product_images \
             WHERE product_id = ? ORDER BY position, id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    /// Lists active products newest first.
    pub async fn list(&self, page: u32, limit: u32) -> DbResult<Page<Product>> {
        let (page, limit) = normalize_pagination(page, limit);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        let pagination = Pagination::new(page, limit, total as u64);

        let items = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 \
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(limit))
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!(page, limit, total, "Listed products");
        Ok(Page { items, pagination })
    }
}

// =============================================================================
// Compound Writes
// =============================================================================

/// Creates a product and its images.
///
/// An image without an explicit position takes its index in `images`.
pub async fn create_product_with_images(
    conn: &mut SqliteConnection,
    new: NewProduct,
    images: Vec<NewProductImage>,
) -> DbResult<ProductWithImages> {
    validate_new_product(&new)?;

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        user_id: new.user_id,
        name: new.name.trim().to_string(),
        description: new.description,
        price: new.price,
        stock: new.stock,
        categories: new.categories,
        supplier_price: new.supplier_price,
        margin: new.margin,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO products (
            id, user_id, name, description, price, stock, categories,
            supplier_price, margin, is_active, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&product.id)
    .bind(&product.user_id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.stock)
    .bind(&product.categories)
    .bind(product.supplier_price)
    .bind(product.margin)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await?;

    let mut created_images = Vec::with_capacity(images.len());
    for (index, image) in images.into_iter().enumerate() {
        let image = ProductImage {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            url: image.url,
            alt: image.alt,
            position: image.position.unwrap_or(index as i64),
        };

        sqlx::query(
            "INSERT INTO product_images (id, product_id, url, alt, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&image.id)
        .bind(&image.product_id)
        .bind(&image.url)
        .bind(&image.alt)
        .bind(image.position)
        .execute(&mut *conn)
        .await?;

        created_images.push(image);
    }
    created_images.sort_by_key(|image| image.position);

    info!(product_id = %product.id, images = created_images.len(), "Product created");

    Ok(ProductWithImages {
        product,
        images: created_images,
    })
}

/// Deletes a product and everything hanging off it, unless it has been sold.
///
/// ## Errors
/// - `NotFound` if the product does not exist
/// - `Conflict` (`Blocked`) if any CONFIRMED or COMPLETED order contains it;
///   nothing is deleted in that case
pub async fn delete_product_completely(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<ProductDeletion> {
    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(DbError::not_found("Product", product_id));
    }

    let completed = OrderStatus::COMPLETED;
    let status_list = placeholders(completed.len());

    let blocking_sql = format!(
        "SELECT COUNT(DISTINCT o.id) FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         WHERE oi.product_id = ? AND o.status IN ({status_list})"
    );
    let mut blocking = sqlx::query_scalar::<_, i64>(&blocking_sql).bind(product_id);
    for status in completed {
        blocking = blocking.bind(status.as_str());
    }
    let order_count = blocking.fetch_one(&mut *conn).await?;

    if order_count > 0 {
        debug!(product_id, order_count, "Product deletion blocked by sold history");
        return Err(CoreError::Blocked {
            product_id: product_id.to_string(),
            order_count,
        }
        .into());
    }

    let cart_items = sqlx::query("DELETE FROM cart_items WHERE product_id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let ratings = sqlx::query("DELETE FROM product_ratings WHERE product_id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let order_items_sql = format!(
        "DELETE FROM order_items WHERE product_id = ? AND order_id IN \
         (SELECT id FROM orders WHERE status NOT IN ({status_list}))"
    );
    let mut delete_items = sqlx::query(&order_items_sql).bind(product_id);
    for status in completed {
        delete_items = delete_items.bind(status.as_str());
    }
    let order_items = delete_items.execute(&mut *conn).await?.rows_affected();

    let images = sqlx::query("DELETE FROM product_images WHERE product_id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    let deletion = ProductDeletion {
        cart_items,
        ratings,
        order_items,
        images,
    };
    info!(product_id, ?deletion, "Product deleted");

    Ok(deletion)
}

/// Adds `delta` (may be negative) to a product's stock.
///
/// ## Errors
/// - `NotFound` if the product does not exist
/// - `Validation` (`NegativeStock`) if the result would drop below zero
pub async fn adjust_product_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
) -> DbResult<Product> {
    let mut product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
    ))
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

    let resulting = product.stock + delta;
    if resulting < 0 {
        return Err(CoreError::NegativeStock {
            current: product.stock,
            resulting,
        }
        .into());
    }

    product.stock = resulting;
    product.updated_at = Utc::now();

    sqlx::query("UPDATE products SET stock = ?, updated_at = ? WHERE id = ?")
        .bind(product.stock)
        .bind(product.updated_at)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    debug!(product_id, delta, stock = product.stock, "Product stock adjusted");
    Ok(product)
}

// =============================================================================
// Unit Tests
// =============================================================================
