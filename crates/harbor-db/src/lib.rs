//! # harbor-db: Database Layer for Harbor POS
//!
//! SQLite storage for the transaction engine and the sync layer, through
//! sqlx with runtime-checked queries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Harbor POS Data Flow                             │
//! │                                                                         │
//! │  TransactionEngine / SyncEngine (harbor-engine)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     harbor-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ Catalog        │   │              │  │   │
//! │  │   │ SqlitePool    │    │ Inventory      │   │ 001_initial  │  │   │
//! │  │   │ begin/acquire │◄───│ Sale, Tax      │   │   _schema    │  │   │
//! │  │   │               │    │ PaymentMethod  │   │              │  │   │
//! │  │   │               │    │ Sync           │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys on)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harbor_db::{Database, DbConfig, CatalogRepository};
//!
//! let db = Database::new(DbConfig::new("harbor.db")).await?;
//! let mut conn = db.acquire().await?;
//! let item = CatalogRepository::new(&mut conn).get_by_sku("tenant-1", "KOPI-01").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    CatalogRepository, InventoryRepository, MovementRequest, PaymentMethodRepository, Reconciliation,
    SaleFilter, SaleRepository, SyncRepository, TaxRuleRepository,
};
