//! # Repository Module
//!
//! Table-family repositories for Harbor POS.
//!
//! ## Connection Borrowing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  let mut tx = db.begin().await?;          one SQLite transaction       │
//! │       │                                                                 │
//! │       ├── SaleRepository::new(&mut tx).insert(&sale)                   │
//! │       ├── SaleRepository::new(&mut tx).insert_line(&line)              │
//! │       ├── InventoryRepository::new(&mut tx).record_movement(&m)        │
//! │       └── SaleRepository::new(&mut tx).mark_completed(...)             │
//! │       │                                                                 │
//! │  tx.commit().await?;                      all or nothing               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A repository is a thin borrow of `&mut SqliteConnection`; both
//! `Transaction` and `PoolConnection` deref to one, so the same repository
//! code runs inside or outside a transaction.
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`] - Catalog items
//! - [`InventoryRepository`] - Stock levels and the movement ledger
//! - [`PaymentMethodRepository`] - Payment methods
//! - [`TaxRuleRepository`] - Tax rules and the tenant default
//! - [`SaleRepository`] - Sales, lines, order-number sequences
//! - [`SyncRepository`] - Sync cursors, export throttle, conflicts

pub mod catalog;
pub mod inventory;
pub mod payment_method;
pub mod sale;
pub mod sync;
pub mod tax;

pub use catalog::CatalogRepository;
pub use inventory::{InventoryRepository, MovementRequest, Reconciliation};
pub use payment_method::PaymentMethodRepository;
pub use sale::{SaleFilter, SaleRepository};
pub use sync::SyncRepository;
pub use tax::TaxRuleRepository;

/// SQLite reads a negative `LIMIT` as "no limit".
pub(crate) fn sql_limit(limit: Option<u32>) -> i64 {
    limit.map_or(-1, i64::from)
}
