//! # harbor-engine: Transaction & Offline-Sync Engine for Harbor POS
//!
//! Sale lifecycle (create, void, refund), the inventory ledger, payment and
//! tax checks, and the sync protocol that lets POS devices sell offline and
//! reconcile later.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Harbor POS Request Flow                          │
//! │                                                                         │
//! │  harbor-api (axum) ──► IdentityContext from headers                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   harbor-engine (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   SyncEngine ──────► TransactionEngine ──────► AuditSink        │   │
//! │  │   delta, export,     create / void / refund    one event per    │   │
//! │  │   ingest, conflicts  stock ledger              operation        │   │
//! │  │                           │                                     │   │
//! │  │                    TenantLocks (one writer per tenant)          │   │
//! │  └───────────────────────────┼─────────────────────────────────────┘   │
//! │                              ▼                                          │
//! │  harbor-db repositories ──► SQLite                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`transaction`] - Sale lifecycle and payment helpers
//! - [`sync`] - Delta, full export, bulk ingestion, conflicts
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Engine error taxonomy and wire codes
//! - [`audit`] - Audit event sinks
//! - [`locks`] - Per-tenant write gate
//! - [`protocol`] - Request/response shapes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harbor_engine::{EngineConfig, SyncEngine, TransactionEngine};
//!
//! let engine = TransactionEngine::new(db, EngineConfig::load(None)?)?;
//! let receipt = engine.create(&ctx, &request).await?;
//! let report = SyncEngine::new(engine).bulk_ingest(&ctx, &batch).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod config;
pub mod error;
pub mod locks;
pub mod protocol;
pub mod sync;
pub mod transaction;

mod inventory;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::EngineConfig;
pub use error::{ConfigError, EngineError, EngineResult, ErrorCode};
pub use locks::{TenantGuard, TenantLocks};
pub use protocol::Envelope;
pub use sync::{sync_token, SyncEngine};
pub use transaction::TransactionEngine;
