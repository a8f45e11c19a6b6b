//! # Product Repository
//!
//! Catalog partitions, one per outlet.
//!
//! ## Search Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    search_products("outlet-1", q)                       │
//! │                                                                         │
//! │  1. barcode = q         idx_products_barcode      (index lookup)       │
//! │  2. sku = q             idx_products_sku          (index lookup)       │
//! │  3. every token of q prefixes a name token                             │
//! │                         idx_product_tokens_token  (range scan)         │
//! │                                                                         │
//! │  Results are concatenated in that order, de-duplicated by id, capped   │
//! │  at `limit`, active products of the outlet only.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Full Replace
//! `replace_outlet_partition` first writes the new catalog to
//! `products_staging`, then swaps it in with one transaction. Readers see
//! the old partition or the new one, nothing in between. Leftover staging
//! rows from an interrupted run are never read and are cleared by the next
//! replace.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use outpost_core::matching::{loose_key, tokenize_name};
use outpost_core::ProductRecord;

use crate::error::DbResult;

const PRODUCT_COLUMNS: &str = "id, outlet_id, sku, barcode, name, category, \
     unit_price_cents, cost_price_cents, tax_rate_bps, quantity_on_hand, \
     reorder_level, is_active, updated_at";

const UPSERT_PRODUCT: &str = r#"
    INSERT INTO products (
        outlet_id, id, sku, barcode, name, category,
        unit_price_cents, cost_price_cents, tax_rate_bps, quantity_on_hand,
        reorder_level, is_active, updated_at, barcode_norm, sku_norm
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
    ON CONFLICT (outlet_id, id) DO UPDATE SET
        sku = excluded.sku,
        barcode = excluded.barcode,
        name = excluded.name,
        category = excluded.category,
        unit_price_cents = excluded.unit_price_cents,
        cost_price_cents = excluded.cost_price_cents,
        tax_rate_bps = excluded.tax_rate_bps,
        quantity_on_hand = excluded.quantity_on_hand,
        reorder_level = excluded.reorder_level,
        is_active = excluded.is_active,
        updated_at = excluded.updated_at,
        barcode_norm = excluded.barcode_norm,
        sku_norm = excluded.sku_norm
"#;

const STAGE_PRODUCT: &str = r#"
    INSERT OR REPLACE INTO products_staging (
        outlet_id, id, sku, barcode, name, category,
        unit_price_cents, cost_price_cents, tax_rate_bps, quantity_on_hand,
        reorder_level, is_active, updated_at, barcode_norm, sku_norm
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
"#;

const SWAP_FROM_STAGING: &str = r#"
    INSERT INTO products (
        outlet_id, id, sku, barcode, name, category,
        unit_price_cents, cost_price_cents, tax_rate_bps, quantity_on_hand,
        reorder_level, is_active, updated_at, barcode_norm, sku_norm
    )
    SELECT
        outlet_id, id, sku, barcode, name, category,
        unit_price_cents, cost_price_cents, tax_rate_bps, quantity_on_hand,
        reorder_level, is_active, updated_at, barcode_norm, sku_norm
    FROM products_staging
    WHERE outlet_id = ?1
"#;

/// Repository for catalog partitions.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts or overwrites products, keyed by `(outlet_id, id)`.
    ///
    /// One transaction per call. A later write for the same id replaces
    /// every field of the earlier one and rebuilds its name tokens.
    ///
    /// ## Returns
    /// Number of records written.
    pub async fn upsert_products(&self, products: &[ProductRecord]) -> DbResult<usize> {
        if products.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for product in products {
            write_product(&mut tx, UPSERT_PRODUCT, &product.outlet_id, product).await?;
            write_tokens(&mut tx, &product.outlet_id, product).await?;
        }
        tx.commit().await?;

        debug!(count = products.len(), "Upserted products");
        Ok(products.len())
    }

    /// Replaces the whole partition of `outlet_id` with `products`.
    ///
    /// Every record is written under `outlet_id` regardless of its own
    /// `outlet_id` field. Duplicate ids in `products` collapse to the last
    /// occurrence.
    ///
    /// ## Returns
    /// Number of rows in the partition after the swap.
    pub async fn replace_outlet_partition(
        &self,
        outlet_id: &str,
        products: &[ProductRecord],
    ) -> DbResult<usize> {
        // Stage
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM products_staging WHERE outlet_id = ?1")
            .bind(outlet_id)
            .execute(&mut *tx)
            .await?;
        for product in products {
            write_product(&mut tx, STAGE_PRODUCT, outlet_id, product).await?;
        }
        tx.commit().await?;

        debug!(outlet_id = %outlet_id, staged = products.len(), "Staged catalog");

        // Swap
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM products WHERE outlet_id = ?1")
            .bind(outlet_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(SWAP_FROM_STAGING)
            .bind(outlet_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM product_tokens WHERE outlet_id = ?1")
            .bind(outlet_id)
            .execute(&mut *tx)
            .await?;
        for product in products {
            write_tokens(&mut tx, outlet_id, product).await?;
        }
        sqlx::query("DELETE FROM products_staging WHERE outlet_id = ?1")
            .bind(outlet_id)
            .execute(&mut *tx)
            .await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE outlet_id = ?1")
            .bind(outlet_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(outlet_id = %outlet_id, count = count, "Replaced catalog partition");
        Ok(count as usize)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Active products of an outlet, ordered by name.
    pub async fn get_active_products(&self, outlet_id: &str) -> DbResult<Vec<ProductRecord>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE outlet_id = ?1 AND is_active = 1 ORDER BY name, id"
        );
        let products = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(outlet_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Every product of an outlet, inactive ones included.
    pub async fn get_all_products(&self, outlet_id: &str) -> DbResult<Vec<ProductRecord>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE outlet_id = ?1 ORDER BY name, id"
        );
        let products = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(outlet_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    pub async fn get_product(&self, outlet_id: &str, id: &str) -> DbResult<Option<ProductRecord>> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE outlet_id = ?1 AND id = ?2");
        let product = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(outlet_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn count(&self, outlet_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE outlet_id = ?1")
            .bind(outlet_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Searches the active products of an outlet.
    ///
    /// Exact barcode hits come first, then exact SKU hits, then name
    /// prefix hits. An empty query lists active products by name.
    pub async fn search_products(
        &self,
        outlet_id: &str,
        query: &str,
        limit: u32,
    ) -> DbResult<Vec<ProductRecord>> {
        let query = query.trim();
        let limit = limit as usize;
        if limit == 0 {
            return Ok(Vec::new());
        }

        debug!(outlet_id = %outlet_id, query = %query, limit = limit, "Searching products");

        if query.is_empty() {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products \
                 WHERE outlet_id = ?1 AND is_active = 1 ORDER BY name, id LIMIT ?2"
            );
            let products = sqlx::query_as::<_, ProductRecord>(&sql)
                .bind(outlet_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;
            return Ok(products);
        }

        let mut results: Vec<ProductRecord> = Vec::new();

        for column in ["barcode", "sku"] {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products \
                 WHERE outlet_id = ?1 AND {column} = ?2 AND is_active = 1 ORDER BY id LIMIT ?3"
            );
            let exact = sqlx::query_as::<_, ProductRecord>(&sql)
                .bind(outlet_id)
                .bind(query)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;
            push_unique(&mut results, exact);
        }

        let tokens = tokenize_name(query);
        if results.len() < limit && !tokens.is_empty() {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE outlet_id = "
            ));
            qb.push_bind(outlet_id.to_string());
            qb.push(" AND is_active = 1");
            for token in &tokens {
                qb.push(" AND id IN (SELECT product_id FROM product_tokens WHERE outlet_id = ");
                qb.push_bind(outlet_id.to_string());
                qb.push(" AND token >= ");
                qb.push_bind(token.clone());
                qb.push(" AND token < ");
                qb.push_bind(prefix_upper_bound(token));
                qb.push(")");
            }
            qb.push(" ORDER BY name, id LIMIT ");
            qb.push_bind((limit + results.len()) as i64);

            let prefixed = qb
                .build_query_as::<ProductRecord>()
                .fetch_all(&self.pool)
                .await?;
            push_unique(&mut results, prefixed);
        }

        results.truncate(limit);
        debug!(count = results.len(), "Search returned products");
        Ok(results)
    }

    /// Finds one active product by scanned code.
    ///
    /// Tries, in order: exact barcode, exact SKU, loose barcode, loose SKU.
    /// Loose forms come from [`loose_key`] and are indexed columns.
    pub async fn find_by_code(&self, outlet_id: &str, code: &str) -> DbResult<Option<ProductRecord>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        let key = Some(loose_key(code)).filter(|k| !k.is_empty());

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE outlet_id = ?1 AND is_active = 1 \
               AND (barcode = ?2 OR sku = ?2 OR barcode_norm = ?3 OR sku_norm = ?3) \
             ORDER BY CASE \
                 WHEN barcode = ?2 THEN 0 \
                 WHEN sku = ?2 THEN 1 \
                 WHEN barcode_norm = ?3 THEN 2 \
                 ELSE 3 END, id \
             LIMIT 1"
        );
        let product = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(outlet_id)
            .bind(code)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Writes one product row with `statement` (upsert or stage).
async fn write_product(
    conn: &mut SqliteConnection,
    statement: &str,
    outlet_id: &str,
    product: &ProductRecord,
) -> DbResult<()> {
    let barcode_norm = product
        .barcode
        .as_deref()
        .map(loose_key)
        .filter(|k| !k.is_empty());

    sqlx::query(statement)
        .bind(outlet_id)
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.unit_price_cents)
        .bind(product.cost_price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.quantity_on_hand)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.updated_at)
        .bind(barcode_norm)
        .bind(loose_key(&product.sku))
        .execute(conn)
        .await?;
    Ok(())
}

/// Rebuilds the name tokens of one product.
async fn write_tokens(
    conn: &mut SqliteConnection,
    outlet_id: &str,
    product: &ProductRecord,
) -> DbResult<()> {
    sqlx::query("DELETE FROM product_tokens WHERE outlet_id = ?1 AND product_id = ?2")
        .bind(outlet_id)
        .bind(&product.id)
        .execute(&mut *conn)
        .await?;

    for token in tokenize_name(&product.name) {
        sqlx::query(
            "INSERT OR IGNORE INTO product_tokens (outlet_id, product_id, token) VALUES (?1, ?2, ?3)",
        )
        .bind(outlet_id)
        .bind(&product.id)
        .bind(token)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Smallest string greater than every string starting with `prefix`.
fn prefix_upper_bound(prefix: &str) -> String {
    format!("{prefix}{}", char::MAX)
}

fn push_unique(results: &mut Vec<ProductRecord>, found: Vec<ProductRecord>) {
    for product in found {
        if !results.iter().any(|p| p.id == product.id) {
            results.push(product);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{TimeZone, Utc};

    fn product(outlet: &str, id: &str, name: &str) -> ProductRecord {
        ProductRecord {
            id: id.to_string(),
            outlet_id: outlet.to_string(),
            sku: format!("SKU-{id}"),
            barcode: None,
            name: name.to_string(),
            category: Some("General".to_string()),
            unit_price_cents: 100,
            cost_price_cents: 60,
            tax_rate_bps: 0,
            quantity_on_hand: 10,
            reorder_level: 2,
            is_active: true,
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    async fn repo() -> ProductRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
    }

    fn ids(products: &[ProductRecord]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_last_write_wins() {
        let repo = repo().await;
        let a1 = product("o1", "a", "Apple Juice");
        let b = product("o1", "b", "Bread");
        repo.upsert_products(&[a1.clone(), b.clone()]).await.unwrap();
        repo.upsert_products(&[a1.clone(), b.clone()]).await.unwrap();

        let mut a2 = a1.clone();
        a2.unit_price_cents = 250;
        a2.name = "Apricot Juice".to_string();
        repo.upsert_products(&[a2.clone()]).await.unwrap();

        let all = repo.get_all_products("o1").await.unwrap();
        assert_eq!(all.len(), 2);
        let stored = repo.get_product("o1", "a").await.unwrap().unwrap();
        assert_eq!(stored, a2);

        // Old name tokens are gone, new ones searchable
        assert!(repo.search_products("o1", "apple", 10).await.unwrap().is_empty());
        assert_eq!(ids(&repo.search_products("o1", "apri", 10).await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_same_id_in_two_outlets_is_two_records() {
        let repo = repo().await;
        repo.upsert_products(&[product("o1", "a", "Tea"), product("o2", "a", "Tea")])
            .await
            .unwrap();
        assert_eq!(repo.count("o1").await.unwrap(), 1);
        assert_eq!(repo.count("o2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_partition_is_exhaustive() {
        let repo = repo().await;
        repo.upsert_products(&[
            product("o1", "a", "Apple"),
            product("o1", "b", "Banana"),
            product("o1", "c", "Cherry"),
            product("o2", "z", "Apple"),
        ])
        .await
        .unwrap();

        let mut b2 = product("o1", "b", "Blueberry");
        b2.unit_price_cents = 999;
        let mut d = product("o1", "d", "Date");
        d.is_active = false;
        let e = product("other-outlet-field", "e", "Elderberry");

        let count = repo
            .replace_outlet_partition("o1", &[b2.clone(), d, e])
            .await
            .unwrap();
        assert_eq!(count, 3);

        let active = repo.get_active_products("o1").await.unwrap();
        assert_eq!(ids(&active), vec!["b", "e"]);
        assert_eq!(active[0].unit_price_cents, 999);
        assert_eq!(active[1].outlet_id, "o1");
        assert_eq!(repo.get_all_products("o1").await.unwrap().len(), 3);

        // Tokens of removed products are gone
        assert!(repo.search_products("o1", "apple", 10).await.unwrap().is_empty());
        // Other partitions untouched
        assert_eq!(ids(&repo.get_all_products("o2").await.unwrap()), vec!["z"]);
    }

    #[tokio::test]
    async fn test_replace_with_empty_list_clears_partition() {
        let repo = repo().await;
        repo.upsert_products(&[product("o1", "a", "Apple")]).await.unwrap();
        assert_eq!(repo.replace_outlet_partition("o1", &[]).await.unwrap(), 0);
        assert!(repo.get_all_products("o1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_collapses_duplicate_ids() {
        let repo = repo().await;
        let first = product("o1", "a", "Old Name");
        let last = product("o1", "a", "New Name");
        repo.replace_outlet_partition("o1", &[first, last]).await.unwrap();

        let all = repo.get_all_products("o1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "New Name");
        assert!(repo.search_products("o1", "old", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leftover_staging_rows_are_invisible() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.upsert_products(&[product("o1", "a", "Apple")]).await.unwrap();

        // Simulate a run that died after staging
        let mut conn = db.pool().acquire().await.unwrap();
        write_product(&mut conn, STAGE_PRODUCT, "o1", &product("o1", "x", "Ghost"))
            .await
            .unwrap();
        drop(conn);

        assert_eq!(ids(&repo.get_all_products("o1").await.unwrap()), vec!["a"]);

        repo.replace_outlet_partition("o1", &[product("o1", "b", "Banana")])
            .await
            .unwrap();
        assert_eq!(ids(&repo.get_all_products("o1").await.unwrap()), vec!["b"]);
        let staged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products_staging")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn test_search_priority_dedup_and_cap() {
        let repo = repo().await;
        let mut by_barcode = product("o1", "p1", "Zebra Cake");
        by_barcode.barcode = Some("cola".to_string());
        let mut by_sku = product("o1", "p2", "Yoghurt");
        by_sku.sku = "cola".to_string();
        let named1 = product("o1", "p3", "Cola Zero");
        let named2 = product("o1", "p4", "Cola Classic");
        let mut inactive = product("o1", "p5", "Cola Retired");
        inactive.is_active = false;
        let elsewhere = product("o2", "p6", "Cola Zero");

        repo.upsert_products(&[by_barcode, by_sku, named1, named2, inactive, elsewhere])
            .await
            .unwrap();

        let results = repo.search_products("o1", " cola ", 10).await.unwrap();
        assert_eq!(ids(&results), vec!["p1", "p2", "p4", "p3"]);

        let capped = repo.search_products("o1", "cola", 3).await.unwrap();
        assert_eq!(ids(&capped), vec!["p1", "p2", "p4"]);
    }

    #[tokio::test]
    async fn test_search_requires_every_token() {
        let repo = repo().await;
        repo.upsert_products(&[
            product("o1", "a", "Coca-Cola Zero 330ml"),
            product("o1", "b", "Coca-Cola Classic 330ml"),
        ])
        .await
        .unwrap();

        assert_eq!(ids(&repo.search_products("o1", "coc zer", 10).await.unwrap()), vec!["a"]);
        assert_eq!(repo.search_products("o1", "330", 10).await.unwrap().len(), 2);
        assert!(repo.search_products("o1", "coc diet", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_lists_active() {
        let repo = repo().await;
        let mut hidden = product("o1", "b", "Bread");
        hidden.is_active = false;
        repo.upsert_products(&[product("o1", "a", "Apple"), hidden])
            .await
            .unwrap();
        assert_eq!(ids(&repo.search_products("o1", "  ", 10).await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_find_by_code_strict_then_loose() {
        let repo = repo().await;
        let mut scanned = product("o1", "a", "Milk");
        scanned.barcode = Some("0-12345-67890-5".to_string());
        let mut coded = product("o1", "b", "Eggs");
        coded.sku = "EGG-12".to_string();
        repo.upsert_products(&[scanned, coded]).await.unwrap();

        let exact = repo.find_by_code("o1", "0-12345-67890-5").await.unwrap().unwrap();
        assert_eq!(exact.id, "a");
        let loose = repo.find_by_code("o1", "012345678905").await.unwrap().unwrap();
        assert_eq!(loose.id, "a");
        let sku = repo.find_by_code("o1", " egg12 ").await.unwrap().unwrap();
        assert_eq!(sku.id, "b");

        assert!(repo.find_by_code("o1", "999").await.unwrap().is_none());
        assert!(repo.find_by_code("o1", "--").await.unwrap().is_none());
        assert!(repo.find_by_code("o2", "EGG-12").await.unwrap().is_none());
    }
}
