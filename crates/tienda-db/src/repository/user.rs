//! # User Repository
//!
//! Every user owns exactly one cart, created in the same transaction as the
//! user row.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::cart::ensure_cart;
use crate::error::{DbError, DbResult};
use tienda_core::validation::validate_new_user;
use tienda_core::{Cart, NewUser, User};

const USER_COLUMNS: &str = "id, name, email, role, commission, created_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// Creates a user and their empty cart.
///
/// Emails are stored trimmed and lower-cased.
///
/// ## Errors
/// - `Validation` for a bad name, email or commission
/// - `UniqueViolation` if the email is taken
pub async fn create_user_with_cart(
    conn: &mut SqliteConnection,
    new: NewUser,
) -> DbResult<(User, Cart)> {
    validate_new_user(&new)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: new.name.trim().to_string(),
        email: new.email.trim().to_lowercase(),
        role: new.role,
        commission: new.commission,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO users (id, name, email, role, commission, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.role)
    .bind(user.commission)
    .bind(user.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate("email", &user.email),
        other => other,
    })?;

    let cart = ensure_cart(conn, &user.id).await?;

    info!(user_id = %user.id, role = user.role.as_str(), "User created");
    Ok((user, cart))
}
