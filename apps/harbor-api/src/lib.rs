//! # Harbor API
//!
//! HTTP front for the transaction and sync engines.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Harbor API Server                              │
//! │                                                                         │
//! │  POS device ──► auth gateway ──► axum router ──► Identity extractor    │
//! │                 (sets x-* headers)      │                               │
//! │                                         ▼                               │
//! │                         TransactionEngine / SyncEngine                  │
//! │                                         │                               │
//! │                                         ▼                               │
//! │                                      SQLite                             │
//! │                                                                         │
//! │  background: resolved-conflict sweep every HARBOR_CLEANUP_INTERVAL_SECS│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `HARBOR_BIND_ADDR` - Listen address (default: 0.0.0.0:8080)
//! - `HARBOR_DATABASE_PATH` - SQLite file (default: ./harbor.db)
//! - `HARBOR_ENGINE_CONFIG` - engine.toml path (default: platform config dir)
//! - `HARBOR_CLEANUP_INTERVAL_SECS` - Conflict sweep period (default: 3600)
//! - `RUST_LOG` - Log filter (default: info)

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

// Re-exports
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::{AppState, Identity};
