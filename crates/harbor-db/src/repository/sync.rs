//! # Sync Repository
//!
//! Per-actor sync cursors, the full-export throttle and the conflict queue.
//!
//! ## Full Export Throttle
//! ```text
//! INSERT INTO sync_state (tenant, actor, last_full_export_at = now)
//!   ON CONFLICT DO UPDATE SET last_full_export_at = now
//!   WHERE last_full_export_at IS NULL OR last_full_export_at <= now - interval
//!       │
//!       ├── 1 row  ──► claimed, export may run
//!       └── 0 rows ──► a full export ran within the interval
//! ```
//! The check and the stamp are one statement, so two concurrent requests
//! cannot both pass.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use harbor_core::{SyncConflict, SyncState};

const CONFLICT_COLUMNS: &str = "id, tenant_id, order_number, existing_sale_id, strategy, client_payload, \
                                status, resolution, resolved_sale_id, resolved_by, device_id, \
                                created_by, created_at, resolved_at";

#[derive(Debug)]
pub struct SyncRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SyncRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SyncRepository { conn }
    }

    // =========================================================================
    // Sync State
    // =========================================================================

    pub async fn state(&mut self, tenant_id: &str, actor_id: &str) -> DbResult<Option<SyncState>> {
        let state = sqlx::query_as::<_, SyncState>(
            r#"
            SELECT tenant_id, actor_id, last_sync_at, last_full_export_at
              FROM sync_state
             WHERE tenant_id = ?1 AND actor_id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(actor_id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(state)
    }

    pub async fn last_sync(&mut self, tenant_id: &str, actor_id: &str) -> DbResult<Option<DateTime<Utc>>> {
        Ok(self
            .state(tenant_id, actor_id)
            .await?
            .and_then(|state| state.last_sync_at))
    }

    /// Records a successful sync for the actor.
    pub async fn touch_last_sync(&mut self, tenant_id: &str, actor_id: &str, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (tenant_id, actor_id, last_sync_at, last_full_export_at)
            VALUES (?1, ?2, ?3, NULL)
            ON CONFLICT (tenant_id, actor_id) DO UPDATE SET last_sync_at = excluded.last_sync_at
            "#,
        )
        .bind(tenant_id)
        .bind(actor_id)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Claims the full-export slot. Returns `false` when the previous full
    /// export is more recent than `cutoff`.
    pub async fn try_claim_full_export(
        &mut self,
        tenant_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_state (tenant_id, actor_id, last_sync_at, last_full_export_at)
            VALUES (?1, ?2, NULL, ?3)
            ON CONFLICT (tenant_id, actor_id) DO UPDATE
               SET last_full_export_at = excluded.last_full_export_at
             WHERE sync_state.last_full_export_at IS NULL
                OR sync_state.last_full_export_at <= ?4
            "#,
        )
        .bind(tenant_id)
        .bind(actor_id)
        .bind(now)
        .bind(cutoff)
        .execute(&mut *self.conn)
        .await?;

        let claimed = result.rows_affected() > 0;
        debug!(tenant_id, actor_id, claimed, "Full export claim");
        Ok(claimed)
    }

    // =========================================================================
    // Conflicts
    // =========================================================================

    pub async fn insert_conflict(&mut self, conflict: &SyncConflict) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_conflicts (
                id, tenant_id, order_number, existing_sale_id, strategy, client_payload,
                status, resolution, resolved_sale_id, resolved_by, device_id,
                created_by, created_at, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&conflict.id)
        .bind(&conflict.tenant_id)
        .bind(&conflict.order_number)
        .bind(&conflict.existing_sale_id)
        .bind(conflict.strategy)
        .bind(&conflict.client_payload)
        .bind(conflict.status)
        .bind(&conflict.resolution)
        .bind(&conflict.resolved_sale_id)
        .bind(&conflict.resolved_by)
        .bind(&conflict.device_id)
        .bind(&conflict.created_by)
        .bind(conflict.created_at)
        .bind(conflict.resolved_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn get_conflict(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<SyncConflict>> {
        let sql = format!(
            "SELECT {CONFLICT_COLUMNS} FROM sync_conflicts WHERE tenant_id = ?1 AND id = ?2"
        );
        let conflict = sqlx::query_as::<_, SyncConflict>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(conflict)
    }

    /// Pending conflicts, oldest first.
    pub async fn pending_conflicts(&mut self, tenant_id: &str, limit: u32) -> DbResult<Vec<SyncConflict>> {
        let sql = format!(
            "SELECT {CONFLICT_COLUMNS} FROM sync_conflicts \
             WHERE tenant_id = ?1 AND status = 'pending' \
             ORDER BY created_at, rowid LIMIT ?2"
        );
        let conflicts = sqlx::query_as::<_, SyncConflict>(&sql)
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(conflicts)
    }

    pub async fn count_pending(&mut self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_conflicts WHERE tenant_id = ?1 AND status = 'pending'",
        )
        .bind(tenant_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(count)
    }

    /// Marks a pending conflict resolved. A conflict resolved by someone
    /// else in the meantime reports [`DbError::Immutable`].
    pub async fn resolve_conflict(
        &mut self,
        tenant_id: &str,
        id: &str,
        resolution: &str,
        resolved_sale_id: Option<&str>,
        resolved_by: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_conflicts
               SET status = 'resolved', resolution = ?3, resolved_sale_id = ?4,
                   resolved_by = ?5, resolved_at = ?6
             WHERE tenant_id = ?1 AND id = ?2 AND status = 'pending'
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(resolution)
        .bind(resolved_sale_id)
        .bind(resolved_by)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.get_conflict(tenant_id, id).await? {
                None => DbError::not_found("SyncConflict", id),
                Some(_) => DbError::Immutable {
                    entity: "SyncConflict".to_string(),
                    id: id.to_string(),
                    reason: "conflict is already resolved".to_string(),
                },
            });
        }
        Ok(())
    }

    /// Deletes resolved conflicts older than `before`. Pending conflicts
    /// are kept regardless of age.
    pub async fn cleanup_resolved(&mut self, tenant_id: Option<&str>, before: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sync_conflicts
             WHERE status = 'resolved' AND resolved_at < ?2
               AND (?1 IS NULL OR tenant_id = ?1)
            "#,
        )
        .bind(tenant_id)
        .bind(before)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
