//! # Settings Repository
//!
//! Key/value settings. The one the reports depend on is
//! `default_product_margin`, a percentage string such as `"30"` or `"27.5"`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;
use tienda_core::validation::validate_required;
use tienda_core::{Rate, DEFAULT_MARGIN_SETTING};

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Inserts or overwrites a setting.
    ///
    /// Cached reports are not touched here; `Backoffice::update_setting`
    /// drops them when the default margin changes.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        validate_required("key", key)?;

        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(key, "Setting saved");
        Ok(())
    }

    /// The site-wide default margin used as the fourth cost tier.
    ///
    /// Missing, unparsable and out-of-range values all mean "no default
    /// margin"; the bad ones are logged.
    pub async fn default_margin(&self) -> DbResult<Option<Rate>> {
        let Some(raw) = self.get(DEFAULT_MARGIN_SETTING).await? else {
            return Ok(None);
        };

        Ok(parse_margin(&raw))
    }
}

fn parse_margin(raw: &str) -> Option<Rate> {
    match raw.trim().parse::<f64>() {
        Ok(pct) if pct.is_finite() && (0.0..=100.0).contains(&pct) => {
            Some(Rate::from_percentage(pct))
        }
        _ => {
            warn!(
                key = DEFAULT_MARGIN_SETTING,
                value = raw,
                "Ignoring invalid default margin setting"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::test_db;

    #[test]
    fn test_parse_margin() {
        assert_eq!(parse_margin("30"), Some(Rate::from_bps(3_000)));
        assert_eq!(parse_margin(" 27.5 "), Some(Rate::from_bps(2_750)));
        assert_eq!(parse_margin("abc"), None);
        assert_eq!(parse_margin("-5"), None);
        assert_eq!(parse_margin("150"), None);
        assert_eq!(parse_margin("NaN"), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let db = test_db().await;
        let settings = db.settings();

        assert_eq!(settings.default_margin().await.unwrap(), None);

        settings.set(DEFAULT_MARGIN_SETTING, "20").await.unwrap();
        settings.set(DEFAULT_MARGIN_SETTING, "35").await.unwrap();

        assert_eq!(
            settings.get(DEFAULT_MARGIN_SETTING).await.unwrap().as_deref(),
            Some("35")
        );
        assert_eq!(
            settings.default_margin().await.unwrap(),
            Some(Rate::from_bps(3_500))
        );
    }
}
