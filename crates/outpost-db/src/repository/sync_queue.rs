//! # Sync Queue Repository
//!
//! Generic deferred operations (stock adjustments, price overrides, ...)
//! waiting for connectivity. Entries are processed oldest first; a done
//! entry is deleted, a failed one stays with its attempt count.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use outpost_core::SyncQueueItem;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

impl SyncQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncQueueRepository { pool }
    }

    /// Queues an operation.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let payload = serde_json::to_string(&adjustment)?;
    /// repo.enqueue("stock_adjustment", &payload).await?;
    /// ```
    pub async fn enqueue(&self, kind: &str, payload: &str) -> DbResult<SyncQueueItem> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sync_queue (kind, payload, attempts, last_error, created_at)
            VALUES (?1, ?2, 0, NULL, ?3)
            RETURNING id
            "#,
        )
        .bind(kind)
        .bind(payload)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = id, kind = %kind, "Queued deferred operation");

        Ok(SyncQueueItem {
            id,
            kind: kind.to_string(),
            payload: payload.to_string(),
            attempts: 0,
            last_error: None,
            created_at: now,
        })
    }

    /// Oldest entries first.
    pub async fn pending(&self, limit: u32) -> DbResult<Vec<SyncQueueItem>> {
        let items = sqlx::query_as::<_, SyncQueueItem>(
            r#"
            SELECT id, kind, payload, attempts, last_error, created_at
            FROM sync_queue
            ORDER BY created_at, id
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Removes a completed entry.
    pub async fn mark_done(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SyncQueueItem", id.to_string()));
        }
        Ok(())
    }

    pub async fn mark_failed(&self, id: i64, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sync_queue SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SyncQueueItem", id.to_string()));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
