//! # Cart Repository
//!
//! Carts are replaced wholesale: the storefront sends the full item list and
//! the stored set becomes exactly that list.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tienda_core::validation::{validate_quantity, validate_required};
use tienda_core::{Cart, CartItem, NewCartItem};

/// A cart with its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartWithItems {
    pub cart: Cart,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    pub async fn get_by_user(&self, user_id: &str) -> DbResult<Option<CartWithItems>> {
        let Some(cart) = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, CartItem>(
            "SELECT id, cart_id, product_id, quantity, created_at FROM cart_items \
             WHERE cart_id = ? ORDER BY rowid",
        )
        .bind(&cart.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(CartWithItems { cart, items }))
    }
}

/// Returns the user's cart, creating it if the user has none.
pub(crate) async fn ensure_cart(conn: &mut SqliteConnection, user_id: &str) -> DbResult<Cart> {
    let existing = sqlx::query_as::<_, Cart>(
        "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(cart) = existing {
        return Ok(cart);
    }

    let now = Utc::now();
    let cart = Cart {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query("INSERT INTO carts (id, user_id, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *conn)
        .await?;

    debug!(user_id, cart_id = %cart.id, "Cart created");
    Ok(cart)
}

/// Replaces every item in the user's cart with `items`.
///
/// The cart is created if missing. An empty `items` empties the cart.
pub async fn replace_cart_items(
    conn: &mut SqliteConnection,
    user_id: &str,
    items: Vec<NewCartItem>,
) -> DbResult<CartWithItems> {
    validate_required("user_id", user_id)?;
    for item in &items {
        validate_required("product_id", &item.product_id)?;
        validate_quantity(item.quantity)?;
    }

    let mut cart = ensure_cart(conn, user_id).await?;
    let now = Utc::now();

    let removed = sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
        .bind(&cart.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let mut created = Vec::with_capacity(items.len());
    for item in items {
        let cart_item = CartItem {
            id: Uuid::new_v4().to_string(),
            cart_id: cart.id.clone(),
            product_id: item.product_id,
            quantity: item.quantity,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO cart_items (id, cart_id, product_id, quantity, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&cart_item.id)
        .bind(&cart_item.cart_id)
        .bind(&cart_item.product_id)
        .bind(cart_item.quantity)
        .bind(cart_item.created_at)
        .execute(&mut *conn)
        .await?;

        created.push(cart_item);
    }

    cart.updated_at = now;
    sqlx::query("UPDATE carts SET updated_at = ? WHERE id = ?")
        .bind(cart.updated_at)
        .bind(&cart.id)
        .execute(&mut *conn)
        .await?;

    debug!(user_id, removed, added = created.len(), "Cart replaced");

    Ok(CartWithItems {
        cart,
        items: created,
    })
}
