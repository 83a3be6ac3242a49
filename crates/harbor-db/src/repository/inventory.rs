//! # Inventory Repository
//!
//! Stock levels and the append-only movement ledger.
//!
//! ## Stock Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      record_movement(request)                           │
//! │                                                                         │
//! │  UPDATE inventories                                                    │
//! │     SET stock = stock + delta                                          │
//! │   WHERE item_id = ? AND stock + delta >= 0                             │
//! │       │                                                                 │
//! │       ├── 0 rows ──► StockUnderflow (or NotFound if no record)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO inventory_ledger (... quantity = delta ...)               │
//! │                                                                         │
//! │  Both statements run on the caller's connection, so inside a           │
//! │  transaction the stock and its ledger row commit together.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement; two concurrent sales can
//! never both pass a stale availability read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use super::sql_limit;
use crate::error::{DbError, DbResult};
use harbor_core::{InventoryRecord, LedgerEntry, MovementKind};

const COLUMNS: &str = "id, tenant_id, item_id, stock, minimum_stock, reserved_stock, \
                       created_at, updated_at, deleted_at";

const LEDGER_COLUMNS: &str = "id, tenant_id, item_id, movement_kind, quantity, line_item_id, \
                              note, created_by, created_at";

/// A stock movement to apply.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub tenant_id: String,
    pub item_id: String,
    pub kind: MovementKind,
    /// Unsigned for stock_in/stock_out, signed for adjustments.
    pub quantity: i64,
    pub line_item_id: Option<String>,
    pub note: String,
    pub created_by: String,
    pub at: DateTime<Utc>,
}

/// Result of comparing stored stock against the ledger sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub ledger_total: i64,
    pub stock: i64,
    pub consistent: bool,
}

#[derive(Debug)]
pub struct InventoryRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> InventoryRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        InventoryRepository { conn }
    }

    /// Creates the inventory record for a tracked item.
    ///
    /// A positive opening stock is written as a `stock_in` ledger entry so
    /// the ledger sum always equals the stored stock.
    pub async fn open(
        &mut self,
        tenant_id: &str,
        item_id: &str,
        opening_stock: i64,
        minimum_stock: i64,
        created_by: &str,
        at: DateTime<Utc>,
    ) -> DbResult<InventoryRecord> {
        if opening_stock < 0 || minimum_stock < 0 {
            return Err(DbError::CheckViolation(
                "opening and minimum stock must not be negative".to_string(),
            ));
        }

        let record = InventoryRecord {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            item_id: item_id.to_string(),
            stock: 0,
            minimum_stock,
            reserved_stock: 0,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO inventories (
                id, tenant_id, item_id, stock, minimum_stock, reserved_stock,
                created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(&record.item_id)
        .bind(record.stock)
        .bind(record.minimum_stock)
        .bind(record.reserved_stock)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.deleted_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("inventory for item", item_id),
            other => other,
        })?;

        if opening_stock > 0 {
            self.record_movement(&MovementRequest {
                tenant_id: tenant_id.to_string(),
                item_id: item_id.to_string(),
                kind: MovementKind::StockIn,
                quantity: opening_stock,
                line_item_id: None,
                note: "Opening stock".to_string(),
                created_by: created_by.to_string(),
                at,
            })
            .await?;
        }

        Ok(InventoryRecord {
            stock: opening_stock,
            ..record
        })
    }

    /// Live inventory record for an item.
    pub async fn get_for_item(&mut self, tenant_id: &str, item_id: &str) -> DbResult<Option<InventoryRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM inventories \
             WHERE tenant_id = ?1 AND item_id = ?2 AND deleted_at IS NULL"
        );
        let record = sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(record)
    }

    /// Applies a movement and appends its ledger entry.
    pub async fn record_movement(&mut self, request: &MovementRequest) -> DbResult<LedgerEntry> {
        let delta = request.kind.signed_quantity(request.quantity).ok_or_else(|| {
            DbError::CheckViolation("movement quantity must not be zero".to_string())
        })?;

        let result = sqlx::query(
            r#"
            UPDATE inventories
               SET stock = stock + ?3, updated_at = ?4
             WHERE tenant_id = ?1 AND item_id = ?2 AND deleted_at IS NULL
               AND stock + ?3 >= 0
            "#,
        )
        .bind(&request.tenant_id)
        .bind(&request.item_id)
        .bind(delta)
        .bind(request.at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_for_item(&request.tenant_id, &request.item_id).await?;
            return Err(match current {
                None => DbError::not_found("Inventory", &request.item_id),
                Some(record) => {
                    warn!(
                        item_id = %request.item_id,
                        delta,
                        stock = record.stock,
                        "Rejected stock movement below zero"
                    );
                    DbError::StockUnderflow {
                        item_id: request.item_id.clone(),
                        delta,
                        available: record.stock,
                    }
                }
            });
        }

        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: request.tenant_id.clone(),
            item_id: request.item_id.clone(),
            movement_kind: request.kind,
            quantity: delta,
            line_item_id: request.line_item_id.clone(),
            note: request.note.clone(),
            created_by: request.created_by.clone(),
            created_at: request.at,
        };

        sqlx::query(
            r#"
            INSERT INTO inventory_ledger (
                id, tenant_id, item_id, movement_kind, quantity, line_item_id,
                note, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.item_id)
        .bind(entry.movement_kind)
        .bind(entry.quantity)
        .bind(&entry.line_item_id)
        .bind(&entry.note)
        .bind(&entry.created_by)
        .bind(entry.created_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            item_id = %entry.item_id,
            kind = entry.movement_kind.as_str(),
            quantity = entry.quantity,
            "Recorded stock movement"
        );

        Ok(entry)
    }

    /// Compares the stored stock with the sum of the item's ledger.
    pub async fn reconcile(&mut self, tenant_id: &str, item_id: &str) -> DbResult<Reconciliation> {
        let record = self
            .get_for_item(tenant_id, item_id)
            .await?
            .ok_or_else(|| DbError::not_found("Inventory", item_id))?;

        let ledger_total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM inventory_ledger WHERE tenant_id = ?1 AND item_id = ?2",
        )
        .bind(tenant_id)
        .bind(item_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(Reconciliation {
            ledger_total,
            stock: record.stock,
            consistent: ledger_total == record.stock,
        })
    }

    /// Records at or below their minimum level.
    pub async fn low_stock(&mut self, tenant_id: &str) -> DbResult<Vec<InventoryRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM inventories \
             WHERE tenant_id = ?1 AND deleted_at IS NULL AND stock <= minimum_stock \
             ORDER BY stock"
        );
        let records = sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(tenant_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(records)
    }

    /// Ledger entries for an item, oldest first.
    pub async fn ledger_for_item(&mut self, tenant_id: &str, item_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM inventory_ledger \
             WHERE tenant_id = ?1 AND item_id = ?2 \
             ORDER BY created_at, rowid"
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(entries)
    }

    /// Changes the minimum and reserved levels. Stock itself only moves
    /// through [`record_movement`](Self::record_movement).
    pub async fn set_levels(
        &mut self,
        tenant_id: &str,
        item_id: &str,
        minimum_stock: i64,
        reserved_stock: i64,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventories
               SET minimum_stock = ?3, reserved_stock = ?4, updated_at = ?5
             WHERE tenant_id = ?1 AND item_id = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(item_id)
        .bind(minimum_stock)
        .bind(reserved_stock)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Inventory", item_id));
        }
        Ok(())
    }

    pub async fn changed_since(&mut self, tenant_id: &str, since: DateTime<Utc>) -> DbResult<Vec<InventoryRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM inventories \
             WHERE tenant_id = ?1 AND (created_at > ?2 OR updated_at > ?2 OR deleted_at > ?2) \
             ORDER BY updated_at"
        );
        let records = sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(tenant_id)
            .bind(since)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(records)
    }

    pub async fn list(&mut self, tenant_id: &str, include_deleted: bool, limit: Option<u32>) -> DbResult<Vec<InventoryRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM inventories \
             WHERE tenant_id = ?1 AND (?2 OR deleted_at IS NULL) \
             ORDER BY updated_at LIMIT ?3"
        );
        let records = sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(tenant_id)
            .bind(include_deleted)
            .bind(sql_limit(limit))
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(records)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
