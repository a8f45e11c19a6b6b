//! # Settings Repository
//!
//! Key/value settings, including the per-outlet catalog cursors stored as
//! `products_cursor_<outlet>` in RFC 3339 form.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use outpost_core::{cursor_key, SettingItem};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn get_item(&self, key: &str) -> DbResult<Option<SettingItem>> {
        let item = sqlx::query_as::<_, SettingItem>(
            "SELECT key, value, updated_at FROM settings WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Inserts or overwrites a setting.
    pub async fn put(&self, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns true when a row was removed.
    pub async fn delete(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Catalog cursors
    // =========================================================================

    /// The last applied catalog change timestamp of an outlet.
    pub async fn get_cursor(&self, outlet_id: &str) -> DbResult<Option<DateTime<Utc>>> {
        let key = cursor_key(outlet_id);
        match self.get(&key).await? {
            None => Ok(None),
            Some(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| DbError::InvalidData(format!("{key} = '{text}': {e}"))),
        }
    }

    pub async fn put_cursor(&self, outlet_id: &str, cursor: DateTime<Utc>) -> DbResult<()> {
        let text = cursor.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        debug!(outlet_id = %outlet_id, cursor = %text, "Persisting catalog cursor");
        self.put(&cursor_key(outlet_id), &text).await
    }

    pub async fn clear_cursor(&self, outlet_id: &str) -> DbResult<bool> {
        self.delete(&cursor_key(outlet_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::TimeZone;

    async fn repo() -> SettingsRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().settings()
    }

    #[tokio::test]
    async fn test_put_get_overwrite_delete() {
        let repo = repo().await;
        assert_eq!(repo.get("theme").await.unwrap(), None);

        repo.put("theme", "dark").await.unwrap();
        repo.put("theme", "light").await.unwrap();
        assert_eq!(repo.get("theme").await.unwrap().as_deref(), Some("light"));
        let item = repo.get_item("theme").await.unwrap().unwrap();
        assert_eq!(item.value, "light");

        assert!(repo.delete("theme").await.unwrap());
        assert!(!repo.delete("theme").await.unwrap());
        assert_eq!(repo.get("theme").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cursor_round_trip_per_outlet() {
        let repo = repo().await;
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap()
            + chrono::Duration::milliseconds(250);

        repo.put_cursor("o1", t).await.unwrap();
        assert_eq!(repo.get_cursor("o1").await.unwrap(), Some(t));
        assert_eq!(repo.get_cursor("o2").await.unwrap(), None);
        assert_eq!(
            repo.get("products_cursor_o1").await.unwrap().as_deref(),
            Some("2024-05-01T12:30:15.250Z")
        );

        assert!(repo.clear_cursor("o1").await.unwrap());
        assert_eq!(repo.get_cursor("o1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_cursor_is_reported() {
        let repo = repo().await;
        repo.put("products_cursor_o1", "yesterday").await.unwrap();
        assert!(matches!(
            repo.get_cursor("o1").await,
            Err(DbError::InvalidData(_))
        ));
    }
}
