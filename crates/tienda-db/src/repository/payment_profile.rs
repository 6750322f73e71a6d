//! # Payment Profile Repository
//!
//! At most one payment profile is active. Activating a new one deactivates
//! the rest in the same transaction; a partial unique index enforces the
//! single-active rule in the schema too.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use tienda_core::validation::validate_required;
use tienda_core::{NewPaymentProfile, PaymentMethodConfig, PaymentProfile};

/// A profile with its method rows in position order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProfileWithMethods {
    pub profile: PaymentProfile,
    pub methods: Vec<PaymentMethodConfig>,
}

#[derive(Debug, Clone)]
pub struct PaymentProfileRepository {
    pool: SqlitePool,
}

impl PaymentProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentProfileRepository { pool }
    }

    /// The currently active profile, if any.
    pub async fn get_active(&self) -> DbResult<Option<PaymentProfileWithMethods>> {
        let Some(profile) = sqlx::query_as::<_, PaymentProfile>(
            "SELECT id, name, is_active, created_at FROM payment_profiles WHERE is_active = 1",
        )
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let methods = sqlx::query_as::<_, PaymentMethodConfig>(
            "SELECT id, profile_id, method, label, instructions, position \
             FROM payment_methods WHERE profile_id = ? ORDER BY position",
        )
        .bind(&profile.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PaymentProfileWithMethods { profile, methods }))
    }
}

/// Deactivates every profile, then creates `new` as the active one.
pub async fn activate_payment_profile(
    conn: &mut SqliteConnection,
    new: NewPaymentProfile,
) -> DbResult<PaymentProfileWithMethods> {
    validate_required("name", &new.name)?;
    for method in &new.methods {
        validate_required("method", &method.method)?;
        validate_required("label", &method.label)?;
    }

    let deactivated = sqlx::query("UPDATE payment_profiles SET is_active = 0 WHERE is_active = 1")
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let profile = PaymentProfile {
        id: Uuid::new_v4().to_string(),
        name: new.name.trim().to_string(),
        is_active: true,
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO payment_profiles (id, name, is_active, created_at) VALUES (?, ?, ?, ?)")
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(profile.is_active)
        .bind(profile.created_at)
        .execute(&mut *conn)
        .await?;

    let mut methods = Vec::with_capacity(new.methods.len());
    for (position, method) in new.methods.into_iter().enumerate() {
        let row = PaymentMethodConfig {
            id: Uuid::new_v4().to_string(),
            profile_id: profile.id.clone(),
            method: method.method,
            label: method.label,
            instructions: method.instructions,
            position: position as i64,
        };

        sqlx::query(
            "INSERT INTO payment_methods (id, profile_id, method, label, instructions, position) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.profile_id)
        .bind(&row.method)
        .bind(&row.label)
        .bind(&row.instructions)
        .bind(row.position)
        .execute(&mut *conn)
        .await?;

        methods.push(row);
    }

    info!(
        profile_id = %profile.id,
        methods = methods.len(),
        deactivated,
        "Payment profile activated"
    );

    Ok(PaymentProfileWithMethods { profile, methods })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::test_db;
    use tienda_core::NewPaymentMethod;

    fn profile(name: &str) -> NewPaymentProfile {
        NewPaymentProfile {
            name: name.to_string(),
            methods: vec![
                NewPaymentMethod {
                    method: "card".to_string(),
                    label: "Credit card".to_string(),
                    instructions: None,
                },
                NewPaymentMethod {
                    method: "transfer".to_string(),
                    label: "Bank transfer".to_string(),
                    instructions: Some("IBAN ES00 0000".to_string()),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_activation_switches_the_active_profile() {
        let db = test_db().await;
        let (first, second) = {
            let mut conn = db.pool().acquire().await.unwrap();
            let first = activate_payment_profile(&mut conn, profile("Spring")).await.unwrap();
            let second = activate_payment_profile(&mut conn, profile("Summer")).await.unwrap();
            (first, second)
        };
        assert_ne!(first.profile.id, second.profile.id);

        let active = db.payment_profiles().get_active().await.unwrap().unwrap();
        assert_eq!(active, second);
        assert_eq!(active.methods[1].position, 1);

        let active_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payment_profiles WHERE is_active = 1")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(active_count, 1);
    }

    #[tokio::test]
    async fn test_blank_method_label_is_rejected() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let mut bad = profile("Broken");
        bad.methods[0].label = "  ".to_string();

        assert!(activate_payment_profile(&mut conn, bad).await.is_err());
    }
}
