//! # Offline Transaction Repository
//!
//! The queue of sales completed while the server was unreachable.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  insert() ──► offline_transactions (status = offline)                  │
//! │                    │                                                    │
//! │                    │ replay fails ──► record_failure()                  │
//! │                    │                  attempts += 1, last_error         │
//! │                    │                  (row stays queued)                │
//! │                    │                                                    │
//! │                    │ server accepts                                     │
//! │                    ▼                                                    │
//! │  accept() ── one SQLite transaction ─────────────────────────┐         │
//! │  │  status = synced                                          │         │
//! │  │  INSERT synced_transactions (cache row)                   │         │
//! │  │  DELETE offline_transactions                              │         │
//! │  └───────────────────────────────────────────────────────────┘         │
//! │                                                                         │
//! │  Another process reading the file sees the queued sale or the cached   │
//! │  accepted sale, never both, never neither.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line items and payment are stored as JSON columns.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use outpost_core::{OfflineTransactionRecord, SyncedTransaction, TransactionStatus};

use crate::error::{DbError, DbResult};

const OFFLINE_COLUMNS: &str = "offline_id, outlet_id, cashier_id, items, payment, \
     created_at, status, attempts, last_error";

/// Raw queue row before the JSON columns are decoded.
#[derive(Debug, sqlx::FromRow)]
struct OfflineTransactionRow {
    offline_id: String,
    outlet_id: String,
    cashier_id: String,
    items: String,
    payment: String,
    created_at: DateTime<Utc>,
    status: TransactionStatus,
    attempts: i64,
    last_error: Option<String>,
}

impl TryFrom<OfflineTransactionRow> for OfflineTransactionRecord {
    type Error = DbError;

    fn try_from(row: OfflineTransactionRow) -> DbResult<Self> {
        let items = serde_json::from_str(&row.items).map_err(|e| {
            DbError::InvalidData(format!("items of {}: {e}", row.offline_id))
        })?;
        let payment = serde_json::from_str(&row.payment).map_err(|e| {
            DbError::InvalidData(format!("payment of {}: {e}", row.offline_id))
        })?;
        Ok(OfflineTransactionRecord {
            offline_id: row.offline_id,
            outlet_id: row.outlet_id,
            cashier_id: row.cashier_id,
            items,
            payment,
            created_at: row.created_at,
            status: row.status,
            attempts: row.attempts,
            last_error: row.last_error,
        })
    }
}

#[derive(Debug, Clone)]
pub struct OfflineTransactionRepository {
    pool: SqlitePool,
}

impl OfflineTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OfflineTransactionRepository { pool }
    }

    /// Queues a sale.
    ///
    /// Storing the same `offline_id` twice keeps the first row.
    ///
    /// ## Returns
    /// `true` when a new row was written.
    pub async fn insert(&self, record: &OfflineTransactionRecord) -> DbResult<bool> {
        let items = serde_json::to_string(&record.items)?;
        let payment = serde_json::to_string(&record.payment)?;

        let result = sqlx::query(
            r#"
            INSERT INTO offline_transactions (
                offline_id, outlet_id, cashier_id, items, payment,
                created_at, status, attempts, last_error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (offline_id) DO NOTHING
            "#,
        )
        .bind(&record.offline_id)
        .bind(&record.outlet_id)
        .bind(&record.cashier_id)
        .bind(items)
        .bind(payment)
        .bind(record.created_at)
        .bind(record.status)
        .bind(record.attempts)
        .bind(&record.last_error)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!(offline_id = %record.offline_id, outlet_id = %record.outlet_id, "Queued offline transaction");
        } else {
            warn!(offline_id = %record.offline_id, "Offline transaction already queued");
        }
        Ok(inserted)
    }

    pub async fn get(&self, offline_id: &str) -> DbResult<Option<OfflineTransactionRecord>> {
        let sql = format!("SELECT {OFFLINE_COLUMNS} FROM offline_transactions WHERE offline_id = ?1");
        let row = sqlx::query_as::<_, OfflineTransactionRow>(&sql)
            .bind(offline_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(OfflineTransactionRecord::try_from).transpose()
    }

    /// Queued sales, oldest first.
    pub async fn list_pending(&self, limit: Option<u32>) -> DbResult<Vec<OfflineTransactionRecord>> {
        let sql = format!(
            "SELECT {OFFLINE_COLUMNS} FROM offline_transactions \
             WHERE status = 'offline' ORDER BY created_at, offline_id LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, OfflineTransactionRow>(&sql)
            .bind(limit.map(i64::from).unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(OfflineTransactionRecord::try_from).collect()
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM offline_transactions WHERE status = 'offline'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Records a failed replay. The sale stays queued.
    pub async fn record_failure(&self, offline_id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE offline_transactions SET
                attempts = attempts + 1,
                last_error = ?2,
                last_attempt_at = ?3
            WHERE offline_id = ?1
            "#,
        )
        .bind(offline_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OfflineTransaction", offline_id));
        }
        Ok(())
    }

    /// Removes an accepted sale from the queue and caches the server's
    /// acknowledgement, in one transaction.
    ///
    /// ## Returns
    /// `true` when a queued row was removed. `false` means another process
    /// already accepted it; the cache row is still refreshed.
    pub async fn accept(&self, synced: &SyncedTransaction) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE offline_transactions SET status = ?2 WHERE offline_id = ?1")
            .bind(&synced.offline_id)
            .bind(TransactionStatus::Synced)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO synced_transactions (
                offline_id, server_id, outlet_id, total_cents, payload, accepted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (offline_id) DO UPDATE SET
                server_id = excluded.server_id,
                total_cents = excluded.total_cents,
                payload = excluded.payload,
                accepted_at = excluded.accepted_at
            "#,
        )
        .bind(&synced.offline_id)
        .bind(&synced.server_id)
        .bind(&synced.outlet_id)
        .bind(synced.total_cents)
        .bind(&synced.payload)
        .bind(synced.accepted_at)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM offline_transactions WHERE offline_id = ?1")
            .bind(&synced.offline_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        info!(
            offline_id = %synced.offline_id,
            server_id = %synced.server_id,
            "Offline transaction accepted"
        );
        Ok(deleted)
    }

    /// Drops a queued sale without caching it. Returns true when a row was
    /// removed.
    pub async fn delete(&self, offline_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM offline_transactions WHERE offline_id = ?1")
            .bind(offline_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Accepted-sale cache
    // =========================================================================

    pub async fn get_synced(&self, offline_id: &str) -> DbResult<Option<SyncedTransaction>> {
        let synced = sqlx::query_as::<_, SyncedTransaction>(
            r#"
            SELECT server_id, offline_id, outlet_id, total_cents, payload, accepted_at
            FROM synced_transactions
            WHERE offline_id = ?1
            "#,
        )
        .bind(offline_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(synced)
    }

    /// Most recently accepted sales of an outlet.
    pub async fn list_synced(&self, outlet_id: &str, limit: u32) -> DbResult<Vec<SyncedTransaction>> {
        let synced = sqlx::query_as::<_, SyncedTransaction>(
            r#"
            SELECT server_id, offline_id, outlet_id, total_cents, payload, accepted_at
            FROM synced_transactions
            WHERE outlet_id = ?1
            ORDER BY accepted_at DESC
            LIMIT ?2
            "#,
        )
        .bind(outlet_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(synced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use outpost_core::{LineItem, PaymentInfo, PaymentMethod};

    fn record(offline_id: &str, minutes: i64) -> OfflineTransactionRecord {
        OfflineTransactionRecord {
            offline_id: offline_id.to_string(),
            outlet_id: "o1".to_string(),
            cashier_id: "c1".to_string(),
            items: vec![LineItem {
                product_id: "p1".to_string(),
                sku: "SKU-1".to_string(),
                name: "Bread".to_string(),
                quantity: 1,
                unit_price_cents: 250,
                tax_rate_bps: 0,
            }],
            payment: PaymentInfo {
                method: PaymentMethod::Cash,
                amount_cents: 250,
                reference: None,
            },
            created_at: DateTime::from_timestamp(1_700_000_000 + minutes * 60, 0).unwrap(),
            status: TransactionStatus::Offline,
            attempts: 0,
            last_error: None,
        }
    }

    fn synced(offline_id: &str) -> SyncedTransaction {
        SyncedTransaction {
            server_id: format!("srv-{offline_id}"),
            offline_id: offline_id.to_string(),
            outlet_id: "o1".to_string(),
            total_cents: 250,
            payload: "{}".to_string(),
            accepted_at: Utc::now(),
        }
    }

    async fn repo() -> OfflineTransactionRepository {
        Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .offline_transactions()
    }

    #[tokio::test]
    async fn test_insert_get_and_duplicate() {
        let repo = repo().await;
        let rec = record("off-1", 0);
        assert!(repo.insert(&rec).await.unwrap());
        assert!(!repo.insert(&rec).await.unwrap());

        let stored = repo.get("off-1").await.unwrap().unwrap();
        assert_eq!(stored, rec);
        assert_eq!(repo.count_pending().await.unwrap(), 1);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_pending_oldest_first() {
        let repo = repo().await;
        repo.insert(&record("late", 5)).await.unwrap();
        repo.insert(&record("early", 1)).await.unwrap();
        repo.insert(&record("middle", 3)).await.unwrap();

        let all = repo.list_pending(None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.offline_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "middle", "late"]);
        assert_eq!(repo.list_pending(Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_record_failure_keeps_sale_queued() {
        let repo = repo().await;
        repo.insert(&record("off-1", 0)).await.unwrap();
        repo.record_failure("off-1", "timeout").await.unwrap();
        repo.record_failure("off-1", "503").await.unwrap();

        let stored = repo.get("off-1").await.unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error.as_deref(), Some("503"));
        assert_eq!(repo.count_pending().await.unwrap(), 1);

        assert!(matches!(
            repo.record_failure("missing", "x").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_accept_moves_sale_to_cache() {
        let repo = repo().await;
        repo.insert(&record("off-1", 0)).await.unwrap();
        repo.insert(&record("off-2", 1)).await.unwrap();

        assert!(repo.accept(&synced("off-1")).await.unwrap());
        assert!(repo.get("off-1").await.unwrap().is_none());
        assert_eq!(repo.count_pending().await.unwrap(), 1);
        let cached = repo.get_synced("off-1").await.unwrap().unwrap();
        assert_eq!(cached.server_id, "srv-off-1");

        // Accepting again is harmless
        assert!(!repo.accept(&synced("off-1")).await.unwrap());
        assert_eq!(repo.list_synced("o1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo().await;
        repo.insert(&record("off-1", 0)).await.unwrap();
        assert!(repo.delete("off-1").await.unwrap());
        assert!(!repo.delete("off-1").await.unwrap());
        assert_eq!(repo.count_pending().await.unwrap(), 0);
    }
}
