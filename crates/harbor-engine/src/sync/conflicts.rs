//! Conflict review and housekeeping.
//!
//! A conflict is an offline sale whose order number was already taken on
//! the server. It stays `pending` until an operator either keeps the
//! stored sale or ingests the client copy under a fresh number. Each
//! resolution runs in its own transaction, so one bad payload doesn't
//! block the rest.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use harbor_core::{Capability, ConflictAction, ConflictStatus, IdentityContext, SyncConflict};
use harbor_db::SyncRepository;

use super::ingest::{check_entry, sale_request};
use super::{require, SyncEngine, RESOURCE};
use crate::config::MAX_RETENTION_DAYS;
use crate::error::{EngineError, EngineResult};
use crate::protocol::{
    CleanupReport, ConflictResolution, IngestTransaction, ResolutionReport, ResolutionResult,
    ResolveConflictsRequest,
};

const DEFAULT_CONFLICT_PAGE: u32 = 100;
const MAX_CONFLICT_PAGE: u32 = 1000;

impl SyncEngine {
    /// Pending conflicts of the tenant, oldest first.
    pub async fn list_conflicts(&self, ctx: &IdentityContext, limit: Option<u32>) -> EngineResult<Vec<SyncConflict>> {
        require(ctx, &[Capability::ResolveConflicts])?;
        let limit = limit.unwrap_or(DEFAULT_CONFLICT_PAGE).clamp(1, MAX_CONFLICT_PAGE);
        let mut conn = self.engine.db.acquire().await?;
        let conflicts = SyncRepository::new(&mut conn)
            .pending_conflicts(&ctx.tenant_id, limit)
            .await?;
        Ok(conflicts)
    }

    pub async fn resolve_conflicts(
        &self,
        ctx: &IdentityContext,
        request: &ResolveConflictsRequest,
    ) -> EngineResult<ResolutionReport> {
        let result = self.resolve_conflicts_inner(ctx, request).await;
        self.engine
            .audit_outcome(ctx, "sync.resolve_conflicts", RESOURCE, None, &result, |report| {
                json!({ "resolved": report.resolved, "failed": report.failed })
            });
        result
    }

    async fn resolve_conflicts_inner(
        &self,
        ctx: &IdentityContext,
        request: &ResolveConflictsRequest,
    ) -> EngineResult<ResolutionReport> {
        require(ctx, &[Capability::ResolveConflicts])?;
        if request.resolutions.is_empty() {
            return Err(EngineError::Validation("resolutions is required".to_string()));
        }

        let _gate = self.engine.locks.lock(&ctx.tenant_id).await;
        let now = self.engine.now();
        let mut report = ResolutionReport {
            resolved: 0,
            failed: 0,
            results: Vec::with_capacity(request.resolutions.len()),
        };

        for resolution in &request.resolutions {
            let mut tx = self.engine.db.begin().await?;
            match self.resolve_one(&mut tx, ctx, resolution, now).await {
                Ok((sale_id, order_number)) => {
                    tx.commit().await?;
                    report.resolved += 1;
                    report.results.push(ResolutionResult {
                        conflict_id: resolution.conflict_id.clone(),
                        action: resolution.action,
                        success: true,
                        resolved_sale_id: Some(sale_id),
                        order_number: Some(order_number),
                        error: None,
                    });
                }
                Err(e) => {
                    tx.rollback().await?;
                    warn!(conflict_id = %resolution.conflict_id, error = %e, "Conflict resolution failed");
                    report.failed += 1;
                    report.results.push(ResolutionResult {
                        conflict_id: resolution.conflict_id.clone(),
                        action: resolution.action,
                        success: false,
                        resolved_sale_id: None,
                        order_number: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            tenant_id = %ctx.tenant_id,
            resolved = report.resolved,
            failed = report.failed,
            "Conflicts resolved"
        );
        Ok(report)
    }

    /// Applies one resolution. Returns the sale that now owns the entry.
    async fn resolve_one(
        &self,
        conn: &mut SqliteConnection,
        ctx: &IdentityContext,
        resolution: &ConflictResolution,
        now: DateTime<Utc>,
    ) -> EngineResult<(String, String)> {
        let tenant_id = ctx.tenant_id.as_str();
        let conflict = SyncRepository::new(&mut *conn)
            .get_conflict(tenant_id, &resolution.conflict_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Conflict", resolution.conflict_id.as_str()))?;
        if conflict.status == ConflictStatus::Resolved {
            return Err(EngineError::Conflict(format!(
                "Conflict {} already resolved",
                conflict.id
            )));
        }

        let (sale_id, order_number) = match resolution.action {
            ConflictAction::KeepServer => (conflict.existing_sale_id.clone(), conflict.order_number.clone()),
            ConflictAction::IngestAsNew => {
                let entry: IngestTransaction = serde_json::from_str(&conflict.client_payload)?;
                let payment_method_id = check_entry(&mut *conn, tenant_id, &entry)
                    .await?
                    .into_payment_method()?;
                let request = sale_request(&entry, payment_method_id, None, conflict.device_id.as_deref());
                let receipt = self.engine.create_in(&mut *conn, ctx, &request, now).await?;
                (receipt.sale.sale.id, receipt.sale.sale.order_number)
            }
        };

        SyncRepository::new(&mut *conn)
            .resolve_conflict(
                tenant_id,
                &conflict.id,
                resolution.action.as_str(),
                Some(&sale_id),
                &ctx.actor_id,
                now,
            )
            .await?;
        info!(
            tenant_id,
            conflict_id = %conflict.id,
            action = resolution.action.as_str(),
            order_number = %order_number,
            "Conflict resolved"
        );
        Ok((sale_id, order_number))
    }

    /// Drops the tenant's resolved conflicts older than `older_than_days`
    /// (default: configured retention).
    pub async fn cleanup(&self, ctx: &IdentityContext, older_than_days: Option<u32>) -> EngineResult<CleanupReport> {
        let result = self.cleanup_inner(ctx, older_than_days).await;
        self.engine.audit_outcome(ctx, "sync.cleanup", RESOURCE, None, &result, |report| {
            json!({ "removedConflicts": report.removed_conflicts, "cutoff": report.cutoff })
        });
        result
    }

    async fn cleanup_inner(&self, ctx: &IdentityContext, older_than_days: Option<u32>) -> EngineResult<CleanupReport> {
        require(ctx, &[Capability::ManageSync])?;
        let days = older_than_days.unwrap_or(self.config().sync.conflict_retention_days);
        if !(1..=MAX_RETENTION_DAYS).contains(&days) {
            return Err(EngineError::Validation(format!(
                "daysToKeep must be within 1..={MAX_RETENTION_DAYS}"
            )));
        }
        let cutoff = self.engine.now() - Duration::days(i64::from(days));

        let mut conn = self.engine.db.acquire().await?;
        let removed_conflicts = SyncRepository::new(&mut conn)
            .cleanup_resolved(Some(&ctx.tenant_id), cutoff)
            .await?;
        info!(tenant_id = %ctx.tenant_id, removed_conflicts, "Resolved conflicts cleaned up");
        Ok(CleanupReport {
            removed_conflicts,
            cutoff,
        })
    }

    /// Retention sweep across all tenants, for the background task.
    pub async fn sweep_resolved_conflicts(&self) -> EngineResult<CleanupReport> {
        let days = self.config().sync.conflict_retention_days;
        let cutoff = self.engine.now() - Duration::days(i64::from(days));

        let mut conn = self.engine.db.acquire().await?;
        let removed_conflicts = SyncRepository::new(&mut conn).cleanup_resolved(None, cutoff).await?;
        if removed_conflicts > 0 {
            info!(removed_conflicts, "Swept resolved conflicts");
        }
        Ok(CleanupReport {
            removed_conflicts,
            cutoff,
        })
    }
}
