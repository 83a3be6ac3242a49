//! # Payment Method Repository
//!
//! Tenant payment methods. Once a method backs a completed sale its name and
//! kind are frozen; only `active` may change.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::sql_limit;
use crate::error::{DbError, DbResult};
use harbor_core::{PaymentKind, PaymentMethod};

const COLUMNS: &str = "id, tenant_id, name, kind, active, created_at, updated_at, deleted_at";

/// Repository for payment methods.
#[derive(Debug)]
pub struct PaymentMethodRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PaymentMethodRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PaymentMethodRepository { conn }
    }

    pub async fn insert(&mut self, method: &PaymentMethod) -> DbResult<()> {
        debug!(tenant_id = %method.tenant_id, name = %method.name, "Inserting payment method");

        sqlx::query(
            r#"
            INSERT INTO payment_methods (
                id, tenant_id, name, kind, active, created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&method.id)
        .bind(&method.tenant_id)
        .bind(&method.name)
        .bind(method.kind)
        .bind(method.active)
        .bind(method.created_at)
        .bind(method.updated_at)
        .bind(method.deleted_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.contains("name") => {
                DbError::duplicate("payment method name", &method.name)
            }
            other => other,
        })?;

        Ok(())
    }

    /// Gets a live method by ID.
    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<PaymentMethod>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM payment_methods \
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL"
        );
        let method = sqlx::query_as::<_, PaymentMethod>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(method)
    }

    /// Resolves a client reference: by ID first, then by exact name.
    pub async fn resolve(&mut self, tenant_id: &str, reference: &str) -> DbResult<Option<PaymentMethod>> {
        if let Some(method) = self.get(tenant_id, reference).await? {
            return Ok(Some(method));
        }
        let sql = format!(
            "SELECT {COLUMNS} FROM payment_methods \
             WHERE tenant_id = ?1 AND name = ?2 AND deleted_at IS NULL"
        );
        let method = sqlx::query_as::<_, PaymentMethod>(&sql)
            .bind(tenant_id)
            .bind(reference)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(method)
    }

    /// True when any completed (or later voided/refunded) sale uses the method.
    pub async fn is_referenced(&mut self, tenant_id: &str, id: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sales
             WHERE tenant_id = ?1 AND payment_method_id = ?2 AND status <> 'pending'
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(count > 0)
    }

    /// Updates a method.
    ///
    /// ## Immutability
    /// ```text
    /// referenced by a completed sale?
    ///      │
    ///      ├── no  ──► name, kind, active may all change
    ///      └── yes ──► only active may change, else DbError::Immutable
    /// ```
    pub async fn update(
        &mut self,
        tenant_id: &str,
        id: &str,
        name: &str,
        kind: PaymentKind,
        active: bool,
        at: DateTime<Utc>,
    ) -> DbResult<PaymentMethod> {
        let current = self
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("PaymentMethod", id))?;

        let identity_changed = current.name != name || current.kind != kind;
        if identity_changed && self.is_referenced(tenant_id, id).await? {
            return Err(DbError::Immutable {
                entity: "PaymentMethod".to_string(),
                id: id.to_string(),
                reason: "name and kind are frozen once used by a completed sale".to_string(),
            });
        }

        sqlx::query(
            r#"
            UPDATE payment_methods
               SET name = ?3, kind = ?4, active = ?5, updated_at = ?6
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(name)
        .bind(kind)
        .bind(active)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(PaymentMethod {
            name: name.to_string(),
            kind,
            active,
            updated_at: at,
            ..current
        })
    }

    pub async fn soft_delete(&mut self, tenant_id: &str, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payment_methods
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
            return Err(DbError::not_found("PaymentMethod", id));
        }
        Ok(())
    }

    pub async fn changed_since(&mut self, tenant_id: &str, since: DateTime<Utc>) -> DbResult<Vec<PaymentMethod>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM payment_methods \
             WHERE tenant_id = ?1 AND (created_at > ?2 OR updated_at > ?2 OR deleted_at > ?2) \
             ORDER BY updated_at"
        );
        let methods = sqlx::query_as::<_, PaymentMethod>(&sql)
            .bind(tenant_id)
            .bind(since)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(methods)
    }

    pub async fn list(&mut self, tenant_id: &str, include_deleted: bool, limit: Option<u32>) -> DbResult<Vec<PaymentMethod>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM payment_methods \
             WHERE tenant_id = ?1 AND (?2 OR deleted_at IS NULL) \
             ORDER BY updated_at LIMIT ?3"
        );
        let methods = sqlx::query_as::<_, PaymentMethod>(&sql)
            .bind(tenant_id)
            .bind(include_deleted)
            .bind(sql_limit(limit))
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(methods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{catalog_item, completed_sale, payment_method, setup};
    use crate::repository::{CatalogRepository, SaleRepository};

    #[tokio::test]
    async fn test_resolve_by_id_or_name() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let cash = payment_method("t1", "Tunai", PaymentKind::Cash);
        let mut repo = PaymentMethodRepository::new(&mut conn);
        repo.insert(&cash).await.unwrap();

        assert_eq!(repo.resolve("t1", &cash.id).await.unwrap().unwrap().id, cash.id);
        assert_eq!(repo.resolve("t1", "Tunai").await.unwrap().unwrap().id, cash.id);
        assert!(repo.resolve("t1", "QRIS").await.unwrap().is_none());
        assert!(repo.resolve("t2", "Tunai").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frozen_once_used_by_completed_sale() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let cash = payment_method("t1", "Tunai", PaymentKind::Cash);
        PaymentMethodRepository::new(&mut conn).insert(&cash).await.unwrap();

        // Unused: rename is fine
        let renamed = PaymentMethodRepository::new(&mut conn)
            .update("t1", &cash.id, "Cash", PaymentKind::Cash, true, Utc::now())
            .await
            .unwrap();
        assert_eq!(renamed.name, "Cash");

        let item = catalog_item("t1", "AIR-01", 300_000, false);
        CatalogRepository::new(&mut conn).insert(&item).await.unwrap();
        let sale = completed_sale("t1", &cash.id, "20240315-0001", 300_000);
        SaleRepository::new(&mut conn).insert(&sale).await.unwrap();

        let mut repo = PaymentMethodRepository::new(&mut conn);
        let err = repo
            .update("t1", &cash.id, "Uang Tunai", PaymentKind::Cash, true, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Immutable { .. }));

        // Deactivation stays allowed
        let inactive = repo
            .update("t1", &cash.id, "Cash", PaymentKind::Cash, false, Utc::now())
            .await
            .unwrap();
        assert!(!inactive.active);
    }
}
