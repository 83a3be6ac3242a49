//! Per-tenant write gate.
//!
//! Every mutating operation takes its tenant's gate before opening a
//! database transaction, and holds it until commit or rollback. Helpers
//! running inside such an operation never take it again.
//!
//! ```text
//! tenant A ── create ──► [gate A] ── begin … commit ── release
//! tenant A ── void ────► waits ──────────────────────► [gate A] ── …
//! tenant B ── create ──► [gate B] ── runs concurrently with A
//! ```
//!
//! A gate lives only while someone holds or waits on it. The last guard
//! to drop removes the tenant's entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type GateMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Debug, Clone, Default)]
pub struct TenantLocks {
    gates: Arc<Mutex<GateMap>>,
}

/// Held tenant gate.
#[derive(Debug)]
pub struct TenantGuard {
    guard: Option<OwnedMutexGuard<()>>,
    tenant_id: String,
    gates: Arc<Mutex<GateMap>>,
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        // Waiters clone the gate under the map lock, so a count of one
        // here means nobody else can reach it.
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        self.guard.take();
        if gates
            .get(&self.tenant_id)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.tenant_id);
        }
    }
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the tenant's gate. Released when the guard drops.
    pub async fn lock(&self, tenant_id: &str) -> TenantGuard {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
            gates
                .entry(tenant_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = gate.lock_owned().await;
        TenantGuard {
            guard: Some(guard),
            tenant_id: tenant_id.to_string(),
            gates: Arc::clone(&self.gates),
        }
    }

    /// Number of tenants whose gate is currently held or awaited.
    pub fn tenant_count(&self) -> usize {
        self.gates.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
