//! # Sync Engine
//!
//! Offline-first synchronization between POS devices and the store server.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Sync Operations                                │
//! │                                                                         │
//! │  SERVER → DEVICE                                                        │
//! │  ───────────────                                                        │
//! │  • delta(since)        created / updated / deleted since a cursor      │
//! │  • full_export()       every record, one call per interval             │
//! │                                                                         │
//! │  DEVICE → SERVER                                                        │
//! │  ───────────────                                                        │
//! │  • bulk_ingest()       offline sales, one savepoint per entry          │
//! │  • validate_only()     same checks, nothing written                    │
//! │                                                                         │
//! │  HOUSEKEEPING                                                           │
//! │  ────────────                                                           │
//! │  • status()            cursor age and pending conflicts                │
//! │  • resolve_conflicts() keep_server | ingest_as_new                     │
//! │  • cleanup()           drop resolved conflicts past retention          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//! | Operation            | Requires                        |
//! |----------------------|---------------------------------|
//! | delta                | `sync_data`                     |
//! | full_export          | `sync_data`, `full_sync`        |
//! | bulk_ingest          | `sync_transactions`             |
//! | validate_only        | `sync_transactions`             |
//! | list/resolve conflicts | `resolve_conflicts`           |
//! | cleanup              | `manage_sync`                   |
//!
//! Every successful delta, full export and committed batch moves the
//! caller's `last_sync_at`.

mod conflicts;
mod delta;
mod export;
mod ingest;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use harbor_core::{Capability, IdentityContext, ResourceType, SyncHealth, SyncRecord};
use harbor_db::SyncRepository;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::protocol::SyncStatus;
use crate::transaction::TransactionEngine;

const RESOURCE: &str = "sync";

#[derive(Clone)]
pub struct SyncEngine {
    engine: TransactionEngine,
}

impl SyncEngine {
    pub fn new(engine: TransactionEngine) -> Self {
        SyncEngine { engine }
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Sync cursor and health for the calling actor.
    pub async fn status(&self, ctx: &IdentityContext) -> EngineResult<SyncStatus> {
        let now = self.engine.now();
        let mut conn = self.engine.db.acquire().await?;

        let mut repo = SyncRepository::new(&mut conn);
        let last_sync_at = repo.last_sync(&ctx.tenant_id, &ctx.actor_id).await?;
        let pending_conflicts = repo.count_pending(&ctx.tenant_id).await?;

        Ok(SyncStatus {
            last_sync_at,
            pending_conflicts,
            health: self.health(last_sync_at, now),
            available_resources: ResourceType::ALL.to_vec(),
            server_timestamp: now,
        })
    }

    fn health(&self, last_sync_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> SyncHealth {
        let Some(last) = last_sync_at else {
            return SyncHealth::NeverSynced;
        };
        let age = now - last;
        if age > self.config().outdated_after() {
            SyncHealth::Outdated
        } else if age > self.config().stale_after() {
            SyncHealth::Stale
        } else {
            SyncHealth::Healthy
        }
    }
}

/// Fails with `PermissionDenied` naming the first missing capability.
fn require(ctx: &IdentityContext, required: &[Capability]) -> EngineResult<()> {
    match ctx.missing(required) {
        Some(capability) => Err(EngineError::PermissionDenied {
            capability: *capability,
        }),
        None => Ok(()),
    }
}

/// `sync_{tenant}_{actor}_{unix seconds}_{16 hex}`.
pub fn sync_token(ctx: &IdentityContext, at: DateTime<Utc>) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "sync_{}_{}_{}_{}",
        ctx.tenant_id,
        ctx.actor_id,
        at.timestamp(),
        &nonce[..16]
    )
}

/// Serializes `body` and stamps it with the sync metadata of `record`.
fn sync_value<R: SyncRecord>(record: &R, body: &impl Serialize) -> EngineResult<Value> {
    let mut value = serde_json::to_value(body)?;
    if let Value::Object(map) = &mut value {
        map.insert("syncId".to_string(), Value::String(record.sync_id()));
        map.insert(
            "lastModified".to_string(),
            serde_json::to_value(record.last_modified())?,
        );
        map.insert(
            "resourceType".to_string(),
            Value::String(R::RESOURCE.as_str().to_string()),
        );
    }
    Ok(value)
}
