//! # Tax Rule Repository

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::sql_limit;
use crate::error::{DbError, DbResult};
use harbor_core::TaxRule;

const COLUMNS: &str = "id, tenant_id, name, rate_bps, is_default, created_at, updated_at, deleted_at";

#[derive(Debug)]
pub struct TaxRuleRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TaxRuleRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        TaxRuleRepository { conn }
    }

    /// Inserts a rule. A second live default for the tenant is rejected by
    /// the partial unique index.
    pub async fn insert(&mut self, rule: &TaxRule) -> DbResult<()> {
        debug!(tenant_id = %rule.tenant_id, name = %rule.name, rate_bps = rule.rate_bps, "Inserting tax rule");

        sqlx::query(
            r#"
            INSERT INTO tax_rules (
                id, tenant_id, name, rate_bps, is_default, created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.tenant_id)
        .bind(&rule.name)
        .bind(rule.rate_bps)
        .bind(rule.is_default)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .bind(rule.deleted_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } if rule.is_default => {
                DbError::duplicate("default tax rule", &rule.tenant_id)
            }
            other => other,
        })?;

        Ok(())
    }

    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<TaxRule>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tax_rules \
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL"
        );
        let rule = sqlx::query_as::<_, TaxRule>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(rule)
    }

    /// The tenant's live default rule, if any.
    pub async fn default_rule(&mut self, tenant_id: &str) -> DbResult<Option<TaxRule>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tax_rules \
             WHERE tenant_id = ?1 AND is_default = 1 AND deleted_at IS NULL"
        );
        let rule = sqlx::query_as::<_, TaxRule>(&sql)
            .bind(tenant_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(rule)
    }

    pub async fn soft_delete(&mut self, tenant_id: &str, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tax_rules
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
            return Err(DbError::not_found("TaxRule", id));
        }
        Ok(())
    }

    pub async fn changed_since(&mut self, tenant_id: &str, since: DateTime<Utc>) -> DbResult<Vec<TaxRule>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tax_rules \
             WHERE tenant_id = ?1 AND (created_at > ?2 OR updated_at > ?2 OR deleted_at > ?2) \
             ORDER BY updated_at"
        );
        let rules = sqlx::query_as::<_, TaxRule>(&sql)
            .bind(tenant_id)
            .bind(since)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rules)
    }

    pub async fn list(&mut self, tenant_id: &str, include_deleted: bool, limit: Option<u32>) -> DbResult<Vec<TaxRule>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tax_rules \
             WHERE tenant_id = ?1 AND (?2 OR deleted_at IS NULL) \
             ORDER BY updated_at LIMIT ?3"
        );
        let rules = sqlx::query_as::<_, TaxRule>(&sql)
            .bind(tenant_id)
            .bind(include_deleted)
            .bind(sql_limit(limit))
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{setup, tax_rule};

    #[tokio::test]
    async fn test_single_default_per_tenant() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = TaxRuleRepository::new(&mut conn);

        assert!(repo.default_rule("t1").await.unwrap().is_none());

        let ppn = tax_rule("t1", "PPN", 1100, true);
        repo.insert(&ppn).await.unwrap();
        let err = repo.insert(&tax_rule("t1", "PB1", 1000, true)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Non-default rules and other tenants are unaffected
        repo.insert(&tax_rule("t1", "PB1", 1000, false)).await.unwrap();
        repo.insert(&tax_rule("t2", "PPN", 1100, true)).await.unwrap();

        assert_eq!(repo.default_rule("t1").await.unwrap().unwrap().id, ppn.id);
    }

    #[tokio::test]
    async fn test_rate_must_be_below_one() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let err = TaxRuleRepository::new(&mut conn)
            .insert(&tax_rule("t1", "Bad", 10_000, false))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation(_)));
    }
}
