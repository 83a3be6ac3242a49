//! # Audit Events
//!
//! Every mutating engine operation emits one [`AuditEvent`], on success and
//! on failure, after the database work is settled.
//!
//! ```text
//! TransactionEngine::void ──► commit / rollback
//!                                   │
//!                                   ▼
//!                         audit::emit(sink, event)
//!                                   │
//!                     ┌─────────────┴─────────────┐
//!                     ▼                           ▼
//!                   Ok(())              Err(e) ── warn!, swallowed
//! ```
//!
//! Sinks are fire-and-forget: a failing sink never changes the outcome of
//! the business operation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use harbor_core::IdentityContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub tenant_id: String,
    pub actor_id: String,
    /// e.g. `transaction.create`, `sync.bulk_ingest`
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Value,
    pub success: bool,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        ctx: &IdentityContext,
        action: &str,
        resource_type: &str,
        resource_id: Option<String>,
        details: Value,
        success: bool,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        AuditEvent {
            tenant_id: ctx.tenant_id.clone(),
            actor_id: ctx.actor_id.clone(),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id,
            details,
            success,
            occurred_at,
        }
    }
}

#[derive(Debug, Error)]
#[error("Audit sink failed: {0}")]
pub struct AuditError(pub String);

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Writes events as structured logs on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        info!(
            target: "audit",
            tenant_id = %event.tenant_id,
            actor_id = %event.actor_id,
            action = %event.action,
            resource_type = %event.resource_type,
            resource_id = ?event.resource_id,
            success = event.success,
            details = %event.details,
            "Audit event"
        );
        Ok(())
    }
}

/// Keeps events in memory. Used by tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: bool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every event.
    pub fn failing() -> Self {
        MemoryAuditSink {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        if self.failing {
            return Err(AuditError("sink unavailable".to_string()));
        }
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Records an event, logging and dropping any sink failure.
pub fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(e) = sink.record(&event) {
        warn!(
            action = %event.action,
            tenant_id = %event.tenant_id,
            error = %e,
            "Audit event dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(action: &str) -> AuditEvent {
        let ctx = IdentityContext::new("t1", "cashier-1");
        AuditEvent::new(&ctx, action, "transaction", None, json!({}), true, Utc::now())
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemoryAuditSink::new();
        emit(&sink, event("transaction.create"));
        emit(&sink, event("transaction.void"));
        assert_eq!(sink.actions(), vec!["transaction.create", "transaction.void"]);
    }

    #[test]
    fn test_failing_sink_is_swallowed() {
        let sink = MemoryAuditSink::failing();
        emit(&sink, event("transaction.create"));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(event("sync.delta")).unwrap();
        assert_eq!(json["tenantId"], "t1");
        assert_eq!(json["actorId"], "cashier-1");
        assert!(json.get("occurredAt").is_some());
    }
}
