//! # Catalog Repository
//!
//! Catalog items: what can be sold and at what price.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::sql_limit;
use crate::error::{DbError, DbResult};
use harbor_core::CatalogItem;

const COLUMNS: &str = "id, tenant_id, sku, name, unit_price_cents, tracks_inventory, \
                       created_at, updated_at, deleted_at";

/// Repository for catalog items.
///
/// ## Usage
/// ```rust,ignore
/// let mut conn = db.acquire().await?;
/// let item = CatalogRepository::new(&mut conn).get("tenant", "item-id").await?;
/// ```
#[derive(Debug)]
pub struct CatalogRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CatalogRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CatalogRepository { conn }
    }

    /// Inserts a new item.
    pub async fn insert(&mut self, item: &CatalogItem) -> DbResult<()> {
        debug!(tenant_id = %item.tenant_id, sku = %item.sku, "Inserting catalog item");

        sqlx::query(
            r#"
            INSERT INTO catalog_items (
                id, tenant_id, sku, name, unit_price_cents, tracks_inventory,
                created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.tenant_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.unit_price_cents)
        .bind(item.tracks_inventory)
        .bind(item.created_at)
        .bind(item.updated_at)
        .bind(item.deleted_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.contains("sku") => {
                DbError::duplicate("sku", &item.sku)
            }
            other => other,
        })?;

        Ok(())
    }

    /// Gets a live item by ID.
    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<CatalogItem>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM catalog_items \
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL"
        );
        let item = sqlx::query_as::<_, CatalogItem>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(item)
    }

    /// Gets a live item by SKU.
    pub async fn get_by_sku(&mut self, tenant_id: &str, sku: &str) -> DbResult<Option<CatalogItem>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM catalog_items \
             WHERE tenant_id = ?1 AND sku = ?2 AND deleted_at IS NULL"
        );
        let item = sqlx::query_as::<_, CatalogItem>(&sql)
            .bind(tenant_id)
            .bind(sku)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(item)
    }

    /// Changes name and price.
    pub async fn update(
        &mut self,
        tenant_id: &str,
        id: &str,
        name: &str,
        unit_price_cents: i64,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE catalog_items
               SET name = ?3, unit_price_cents = ?4, updated_at = ?5
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(name)
        .bind(unit_price_cents)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CatalogItem", id));
        }
        Ok(())
    }

    /// Soft-deletes an item.
    pub async fn soft_delete(&mut self, tenant_id: &str, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE catalog_items
               SET deleted_at = ?3, updated_at = ?3
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CatalogItem", id));
        }
        Ok(())
    }

    /// Items created, updated or deleted after `since`.
    pub async fn changed_since(&mut self, tenant_id: &str, since: DateTime<Utc>) -> DbResult<Vec<CatalogItem>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM catalog_items \
             WHERE tenant_id = ?1 AND (created_at > ?2 OR updated_at > ?2 OR deleted_at > ?2) \
             ORDER BY updated_at"
        );
        let items = sqlx::query_as::<_, CatalogItem>(&sql)
            .bind(tenant_id)
            .bind(since)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(items)
    }

    /// Full listing ordered by `updated_at`; `None` returns every row.
    pub async fn list(&mut self, tenant_id: &str, include_deleted: bool, limit: Option<u32>) -> DbResult<Vec<CatalogItem>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM catalog_items \
             WHERE tenant_id = ?1 AND (?2 OR deleted_at IS NULL) \
             ORDER BY updated_at LIMIT ?3"
        );
        let items = sqlx::query_as::<_, CatalogItem>(&sql)
            .bind(tenant_id)
            .bind(include_deleted)
            .bind(sql_limit(limit))
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{catalog_item, setup};
    use chrono::Duration;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let item = catalog_item("t1", "KOPI-01", 1_800_000, true);

        CatalogRepository::new(&mut conn).insert(&item).await.unwrap();

        let mut repo = CatalogRepository::new(&mut conn);
        let found = repo.get("t1", &item.id).await.unwrap().unwrap();
        assert_eq!(found.sku, "KOPI-01");
        assert_eq!(found.unit_price_cents, 1_800_000);
        assert!(found.tracks_inventory);

        // Tenant isolation
        assert!(repo.get("t2", &item.id).await.unwrap().is_none());
        assert!(repo.get_by_sku("t1", "KOPI-01").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_sku_per_tenant() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = CatalogRepository::new(&mut conn);

        repo.insert(&catalog_item("t1", "TEH-01", 500_000, false)).await.unwrap();
        let err = repo
            .insert(&catalog_item("t1", "TEH-01", 600_000, false))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));

        // Another tenant may reuse the SKU
        repo.insert(&catalog_item("t2", "TEH-01", 500_000, false)).await.unwrap();
    }

    #[tokio::test]
    async fn test_soft_delete_and_changes() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = CatalogRepository::new(&mut conn);
        let item = catalog_item("t1", "ROTI-01", 1_200_000, false);
        repo.insert(&item).await.unwrap();

        let since = item.created_at + Duration::seconds(1);
        assert!(repo.changed_since("t1", since).await.unwrap().is_empty());

        repo.soft_delete("t1", &item.id, since + Duration::seconds(1)).await.unwrap();
        assert!(repo.get("t1", &item.id).await.unwrap().is_none());

        let changed = repo.changed_since("t1", since).await.unwrap();
        assert_eq!(changed.len(), 1);
        assert!(changed[0].deleted_at.is_some());

        assert!(repo.list("t1", false, None).await.unwrap().is_empty());
        assert_eq!(repo.list("t1", true, None).await.unwrap().len(), 1);
    }
}
