//! # Sale Repository
//!
//! Sale headers and lines.
//!
//! ## Status Transitions
//! ```text
//! INSERT (pending) ──► mark_completed ──► mark_voided
//!                                    └──► mark_refunded
//! ```
//! Each `mark_*` statement is guarded by the expected current status, so a
//! second void or refund of the same sale changes nothing and reports
//! [`DbError::Immutable`].

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::sql_limit;
use crate::error::{DbError, DbResult};
use harbor_core::{OrderNumber, Sale, SaleLine, SaleStatus, SaleWithLines};

const COLUMNS: &str = "id, tenant_id, order_number, payment_method_id, tax_rule_id, tax_rate_bps, \
                       sub_total_cents, discount_cents, tax_cents, grand_total_cents, paid_cents, \
                       change_cents, status, notes, void_reason, voided_at, refund_cents, \
                       refund_reason, refunded_at, created_by, device_id, created_at, updated_at, \
                       completed_at, deleted_at";

const LINE_COLUMNS: &str = "id, tenant_id, sale_id, item_id, quantity, unit_price_cents, \
                            line_total_cents, tax_cents, refunded_at, created_at";

/// Filter for sale listings.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug)]
pub struct SaleRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SaleRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SaleRepository { conn }
    }

    // =========================================================================
    // Order Numbers
    // =========================================================================

    /// Highest order sequence used by the tenant's live sales on `date`.
    ///
    /// Only numbers of the form `YYYYMMDD-NNNN` whose sequence fits a `u32`
    /// count; anything else stored under the day's prefix is skipped.
    pub async fn highest_sequence(&mut self, tenant_id: &str, date: NaiveDate) -> DbResult<Option<u32>> {
        let pattern = format!("{}%", OrderNumber::day_prefix(date));
        let highest: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(CAST(substr(order_number, 10) AS INTEGER))
              FROM sales
             WHERE tenant_id = ?1 AND order_number LIKE ?2 AND deleted_at IS NULL
               AND length(order_number) BETWEEN 13 AND 19
               AND substr(order_number, 10) NOT GLOB '*[^0-9]*'
               AND CAST(substr(order_number, 10) AS INTEGER) BETWEEN 1 AND ?3
            "#,
        )
        .bind(tenant_id)
        .bind(pattern)
        .bind(i64::from(u32::MAX))
        .fetch_one(&mut *self.conn)
        .await?;

        highest
            .map(|seq| u32::try_from(seq).map_err(|_| DbError::InvalidData(format!("order sequence {seq}"))))
            .transpose()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a sale header.
    ///
    /// A live sale with the same order number surfaces as a
    /// `UniqueViolation` on `order_number`.
    pub async fn insert(&mut self, sale: &Sale) -> DbResult<()> {
        debug!(tenant_id = %sale.tenant_id, order_number = %sale.order_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, order_number, payment_method_id, tax_rule_id, tax_rate_bps,
                sub_total_cents, discount_cents, tax_cents, grand_total_cents, paid_cents,
                change_cents, status, notes, void_reason, voided_at, refund_cents,
                refund_reason, refunded_at, created_by, device_id, created_at, updated_at,
                completed_at, deleted_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.order_number)
        .bind(&sale.payment_method_id)
        .bind(&sale.tax_rule_id)
        .bind(sale.tax_rate_bps)
        .bind(sale.sub_total_cents)
        .bind(sale.discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.grand_total_cents)
        .bind(sale.paid_cents)
        .bind(sale.change_cents)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(&sale.void_reason)
        .bind(sale.voided_at)
        .bind(sale.refund_cents)
        .bind(&sale.refund_reason)
        .bind(sale.refunded_at)
        .bind(&sale.created_by)
        .bind(&sale.device_id)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.completed_at)
        .bind(sale.deleted_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.contains("order_number") => {
                DbError::duplicate("order_number", &sale.order_number)
            }
            other => other,
        })?;

        Ok(())
    }

    pub async fn insert_line(&mut self, line: &SaleLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, tenant_id, sale_id, item_id, quantity, unit_price_cents,
                line_total_cents, tax_cents, refunded_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&line.id)
        .bind(&line.tenant_id)
        .bind(&line.sale_id)
        .bind(&line.item_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .bind(line.tax_cents)
        .bind(line.refunded_at)
        .bind(line.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// `pending → completed`, recording the tender and change.
    pub async fn mark_completed(
        &mut self,
        tenant_id: &str,
        id: &str,
        paid_cents: i64,
        change_cents: i64,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales
               SET status = 'completed', paid_cents = ?3, change_cents = ?4,
                   completed_at = ?5, updated_at = ?5
             WHERE tenant_id = ?1 AND id = ?2 AND status = 'pending' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(paid_cents)
        .bind(change_cents)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        self.expect_transition(result.rows_affected(), id, "pending")
    }

    /// `completed → voided`.
    pub async fn mark_voided(&mut self, tenant_id: &str, id: &str, reason: &str, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales
               SET status = 'voided', void_reason = ?3, voided_at = ?4, updated_at = ?4
             WHERE tenant_id = ?1 AND id = ?2 AND status = 'completed' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(reason)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        self.expect_transition(result.rows_affected(), id, "completed")
    }

    /// `completed → refunded`.
    pub async fn mark_refunded(
        &mut self,
        tenant_id: &str,
        id: &str,
        refund_cents: i64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales
               SET status = 'refunded', refund_cents = ?3, refund_reason = ?4,
                   refunded_at = ?5, updated_at = ?5
             WHERE tenant_id = ?1 AND id = ?2 AND status = 'completed' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(refund_cents)
        .bind(reason)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        self.expect_transition(result.rows_affected(), id, "completed")
    }

    /// Stamps `refunded_at` on the given lines of a sale.
    pub async fn mark_lines_refunded(
        &mut self,
        tenant_id: &str,
        sale_id: &str,
        line_ids: &[String],
        at: DateTime<Utc>,
    ) -> DbResult<u64> {
        let mut affected = 0;
        for line_id in line_ids {
            let result = sqlx::query(
                r#"
                UPDATE sale_lines
                   SET refunded_at = ?4
                 WHERE tenant_id = ?1 AND sale_id = ?2 AND id = ?3 AND refunded_at IS NULL
                "#,
            )
            .bind(tenant_id)
            .bind(sale_id)
            .bind(line_id)
            .bind(at)
            .execute(&mut *self.conn)
            .await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    pub async fn soft_delete(&mut self, tenant_id: &str, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales
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
            return Err(DbError::not_found("Sale", id));
        }
        Ok(())
    }

    fn expect_transition(&self, rows: u64, id: &str, expected: &str) -> DbResult<()> {
        if rows == 0 {
            return Err(DbError::Immutable {
                entity: "Sale".to_string(),
                id: id.to_string(),
                reason: format!("sale is no longer {expected}"),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL"
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(sale)
    }

    pub async fn find_by_order_number(&mut self, tenant_id: &str, order_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND order_number = ?2 AND deleted_at IS NULL"
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(order_number)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(sale)
    }

    /// Lines of a sale in insertion order.
    pub async fn lines(&mut self, tenant_id: &str, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM sale_lines \
             WHERE tenant_id = ?1 AND sale_id = ?2 \
             ORDER BY created_at, rowid"
        );
        let lines = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(tenant_id)
            .bind(sale_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(lines)
    }

    /// Header plus lines.
    pub async fn get_with_lines(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<SaleWithLines>> {
        let Some(sale) = self.get(tenant_id, id).await? else {
            return Ok(None);
        };
        let lines = self.lines(tenant_id, &sale.id).await?;
        Ok(Some(SaleWithLines { sale, lines }))
    }

    /// Newest first.
    pub async fn list(&mut self, tenant_id: &str, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND deleted_at IS NULL \
               AND (?2 IS NULL OR status = ?2) \
               AND (?3 IS NULL OR created_at >= ?3) \
               AND (?4 IS NULL OR created_at <= ?4) \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?5 OFFSET ?6"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.created_from)
            .bind(filter.created_to)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(sales)
    }

    /// Sales created, updated or deleted after `since`, with their lines.
    pub async fn changed_since(&mut self, tenant_id: &str, since: DateTime<Utc>) -> DbResult<Vec<SaleWithLines>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND (created_at > ?2 OR updated_at > ?2 OR deleted_at > ?2) \
             ORDER BY updated_at"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(since)
            .fetch_all(&mut *self.conn)
            .await?;
        self.attach_lines(tenant_id, sales).await
    }

    /// Full listing with lines, ordered by `updated_at`; `None` returns
    /// every sale.
    pub async fn list_with_lines(
        &mut self,
        tenant_id: &str,
        include_deleted: bool,
        limit: Option<u32>,
    ) -> DbResult<Vec<SaleWithLines>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND (?2 OR deleted_at IS NULL) \
             ORDER BY updated_at LIMIT ?3"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(include_deleted)
            .bind(sql_limit(limit))
            .fetch_all(&mut *self.conn)
            .await?;
        self.attach_lines(tenant_id, sales).await
    }

    async fn attach_lines(&mut self, tenant_id: &str, sales: Vec<Sale>) -> DbResult<Vec<SaleWithLines>> {
        let mut out = Vec::with_capacity(sales.len());
        for sale in sales {
            let lines = self.lines(tenant_id, &sale.id).await?;
            out.push(SaleWithLines { sale, lines });
        }
        Ok(out)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{catalog_item, completed_sale, payment_method, setup};
    use crate::repository::{CatalogRepository, PaymentMethodRepository};
    use harbor_core::PaymentKind;
    use uuid::Uuid;

    async fn seeded() -> (crate::Database, String, String) {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let cash = payment_method("t1", "Tunai", PaymentKind::Cash);
        PaymentMethodRepository::new(&mut conn).insert(&cash).await.unwrap();
        let item = catalog_item("t1", "KOPI-01", 1_000_000, false);
        CatalogRepository::new(&mut conn).insert(&item).await.unwrap();
        drop(conn);
        (db, cash.id, item.id)
    }

    #[tokio::test]
    async fn test_highest_sequence_per_day_and_tenant() {
        let (db, cash_id, _) = seeded().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SaleRepository::new(&mut conn);
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        assert_eq!(repo.highest_sequence("t1", date).await.unwrap(), None);

        repo.insert(&completed_sale("t1", &cash_id, "20240315-0001", 100)).await.unwrap();
        repo.insert(&completed_sale("t1", &cash_id, "20240315-0012", 100)).await.unwrap();
        repo.insert(&completed_sale("t1", &cash_id, "20240316-0099", 100)).await.unwrap();

        assert_eq!(repo.highest_sequence("t1", date).await.unwrap(), Some(12));
        assert_eq!(repo.highest_sequence("t2", date).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_highest_sequence_skips_malformed_numbers() {
        let (db, cash_id, _) = seeded().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SaleRepository::new(&mut conn);
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        repo.insert(&completed_sale("t1", &cash_id, "20240315-0007", 100)).await.unwrap();
        for odd in ["20240315-99999999999", "20240315-4294967296", "20240315-12ab", "20240315-7"] {
            repo.insert(&completed_sale("t1", &cash_id, odd, 100)).await.unwrap();
        }
        assert_eq!(repo.highest_sequence("t1", date).await.unwrap(), Some(7));

        repo.insert(&completed_sale("t1", &cash_id, "20240315-4294967295", 100)).await.unwrap();
        assert_eq!(repo.highest_sequence("t1", date).await.unwrap(), Some(u32::MAX));
    }

    #[tokio::test]
    async fn test_duplicate_order_number() {
        let (db, cash_id, _) = seeded().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SaleRepository::new(&mut conn);

        repo.insert(&completed_sale("t1", &cash_id, "20240315-0001", 100)).await.unwrap();
        let err = repo
            .insert(&completed_sale("t1", &cash_id, "20240315-0001", 100))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("order_number"));
    }

    #[tokio::test]
    async fn test_totals_check_constraint() {
        let (db, cash_id, _) = seeded().await;
        let mut conn = db.acquire().await.unwrap();
        let mut sale = completed_sale("t1", &cash_id, "20240315-0001", 100);
        sale.grand_total_cents += 1;

        let err = SaleRepository::new(&mut conn).insert(&sale).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation(_)));
    }

    #[tokio::test]
    async fn test_void_only_once() {
        let (db, cash_id, item_id) = seeded().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SaleRepository::new(&mut conn);
        let sale = completed_sale("t1", &cash_id, "20240315-0001", 1_000_000);
        repo.insert(&sale).await.unwrap();
        repo.insert_line(&SaleLine {
            id: Uuid::new_v4().to_string(),
            tenant_id: "t1".to_string(),
            sale_id: sale.id.clone(),
            item_id,
            quantity: 1,
            unit_price_cents: 1_000_000,
            line_total_cents: 1_000_000,
            tax_cents: 0,
            refunded_at: None,
            created_at: sale.created_at,
        })
        .await
        .unwrap();

        repo.mark_voided("t1", &sale.id, "wrong item", Utc::now()).await.unwrap();
        let err = repo.mark_voided("t1", &sale.id, "again", Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::Immutable { .. }));

        let found = repo.get_with_lines("t1", &sale.id).await.unwrap().unwrap();
        assert_eq!(found.sale.status, SaleStatus::Voided);
        assert_eq!(found.sale.void_reason.as_deref(), Some("wrong item"));
        assert_eq!(found.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filter_by_status() {
        let (db, cash_id, _) = seeded().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SaleRepository::new(&mut conn);

        let first = completed_sale("t1", &cash_id, "20240315-0001", 100);
        repo.insert(&first).await.unwrap();
        repo.insert(&completed_sale("t1", &cash_id, "20240315-0002", 100)).await.unwrap();
        repo.mark_refunded("t1", &first.id, 100, "damaged", Utc::now()).await.unwrap();

        let filter = SaleFilter {
            status: Some(SaleStatus::Refunded),
            limit: 50,
            ..SaleFilter::default()
        };
        let refunded = repo.list("t1", &filter).await.unwrap();
        assert_eq!(refunded.len(), 1);
        assert_eq!(refunded[0].refund_cents, Some(100));

        let all = repo.list("t1", &SaleFilter { limit: 50, ..SaleFilter::default() }).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
