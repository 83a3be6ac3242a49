//! Full export: every current record per resource type, each list capped
//! only when the caller passes a `limit`.
//!
//! Expensive, so each (tenant, actor) gets one call per configured
//! interval. The slot is claimed with a conditional upsert on `sync_state`
//! inside the export's own transaction, so two racing calls can't both win.

use serde_json::{json, Value};
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use tracing::{info, warn};

use harbor_core::{Capability, IdentityContext, ResourceType};
use harbor_db::{
    CatalogRepository, InventoryRepository, PaymentMethodRepository, SaleRepository, SyncRepository,
    TaxRuleRepository,
};

use super::{require, sync_token, sync_value, SyncEngine, RESOURCE};
use crate::error::{EngineError, EngineResult};
use crate::protocol::{FullExportRequest, FullExportResponse};

impl SyncEngine {
    pub async fn full_export(&self, ctx: &IdentityContext, request: &FullExportRequest) -> EngineResult<FullExportResponse> {
        let result = self.full_export_inner(ctx, request).await;
        self.engine.audit_outcome(ctx, "sync.full_export", RESOURCE, None, &result, |export| {
            json!({
                "resourceTypes": export.data.keys().collect::<Vec<_>>(),
                "totalRecords": export.total_records,
                "includeDeleted": request.include_deleted,
            })
        });
        result
    }

    async fn full_export_inner(
        &self,
        ctx: &IdentityContext,
        request: &FullExportRequest,
    ) -> EngineResult<FullExportResponse> {
        require(ctx, &[Capability::SyncData, Capability::FullSync])?;
        let selected = ResourceType::parse_list(request.resource_types.as_slice())?;
        if request.limit == Some(0) {
            return Err(EngineError::Validation("limit must be positive".to_string()));
        }
        let limit = request.limit;

        let now = self.engine.now();
        let interval = self.config().full_export_interval();
        let mut tx = self.engine.db.begin().await?;

        let claimed = SyncRepository::new(&mut tx)
            .try_claim_full_export(&ctx.tenant_id, &ctx.actor_id, now, now - interval)
            .await?;
        if !claimed {
            let last = SyncRepository::new(&mut tx)
                .state(&ctx.tenant_id, &ctx.actor_id)
                .await?
                .and_then(|state| state.last_full_export_at)
                .unwrap_or(now);
            let remaining = (last + interval - now).num_seconds();
            let retry_after_secs = u64::try_from(remaining).unwrap_or(0).max(1);
            warn!(
                tenant_id = %ctx.tenant_id,
                actor_id = %ctx.actor_id,
                retry_after_secs,
                "Full export rate limited"
            );
            return Err(EngineError::RateLimited { retry_after_secs });
        }

        let mut data = BTreeMap::new();
        for resource in selected {
            let records =
                export_resource(&mut tx, &ctx.tenant_id, resource, request.include_deleted, limit).await?;
            data.insert(resource, records);
        }
        let total_records = data.values().map(Vec::len).sum();

        SyncRepository::new(&mut tx)
            .touch_last_sync(&ctx.tenant_id, &ctx.actor_id, now)
            .await?;
        tx.commit().await?;

        info!(
            tenant_id = %ctx.tenant_id,
            actor_id = %ctx.actor_id,
            total_records,
            "Full export served"
        );

        Ok(FullExportResponse {
            data,
            sync_timestamp: now,
            sync_token: sync_token(ctx, now),
            total_records,
        })
    }
}

async fn export_resource(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    resource: ResourceType,
    include_deleted: bool,
    limit: Option<u32>,
) -> EngineResult<Vec<Value>> {
    match resource {
        ResourceType::Items => CatalogRepository::new(conn)
            .list(tenant_id, include_deleted, limit)
            .await?
            .iter()
            .map(|item| sync_value(item, item))
            .collect(),
        ResourceType::Inventories => InventoryRepository::new(conn)
            .list(tenant_id, include_deleted, limit)
            .await?
            .iter()
            .map(|record| sync_value(record, record))
            .collect(),
        ResourceType::Transactions => SaleRepository::new(conn)
            .list_with_lines(tenant_id, include_deleted, limit)
            .await?
            .iter()
            .map(|sale| sync_value(&sale.sale, sale))
            .collect(),
        ResourceType::PaymentMethods => PaymentMethodRepository::new(conn)
            .list(tenant_id, include_deleted, limit)
            .await?
            .iter()
            .map(|method| sync_value(method, method))
            .collect(),
        ResourceType::Taxes => TaxRuleRepository::new(conn)
            .list(tenant_id, include_deleted, limit)
            .await?
            .iter()
            .map(|rule| sync_value(rule, rule))
            .collect(),
    }
}
