//! # harbor-core: Pure Business Logic for Harbor POS
//!
//! Money, tax and payment math, order numbers, domain types and the identity
//! context. Zero I/O: everything here is deterministic and unit-tested in
//! isolation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Harbor POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             harbor-api (axum)    POS devices / sync clients     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │      harbor-engine: TransactionEngine, SyncEngine               │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────────────────┐  ┌────▼───────────────┐   │
//! │  │        ★ harbor-core (THIS CRATE) ★     │  │    harbor-db       │   │
//! │  │                                          │  │  SQLite, ledger    │   │
//! │  │  money   tax   payment   pricing         │  └────────────────────┘   │
//! │  │  types   order_number   context  traits  │                           │
//! │  │                                          │                           │
//! │  │  NO I/O • NO DATABASE • NO NETWORK       │                           │
//! │  └──────────────────────────────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (minor units)
//! - [`types`] - Domain entities and enums
//! - [`tax`] - Exclusive/inclusive tax, rule resolution, validation
//! - [`payment`] - Tender rules, change, denomination breakdown, split tender
//! - [`pricing`] - Sale totals and per-item stock aggregation
//! - [`order_number`] - `YYYYMMDD-NNNN` identifiers
//! - [`context`] - Explicit `(tenant, actor, capabilities)` caller context
//! - [`traits`] - `TenantOwned`, `SoftDeletable`, `Timestamped`, `SyncRecord`
//! - [`clock`] - Injected time source
//! - [`validation`] - Field-level rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use harbor_core::money::Money;
//! use harbor_core::tax::TaxCalculator;
//! use harbor_core::types::TaxRate;
//!
//! let split = TaxCalculator::compute_exclusive(Money::from_major(100_000), TaxRate::from_bps(1100));
//! assert_eq!(split.total, Money::from_major(111_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod context;
pub mod error;
pub mod money;
pub mod order_number;
pub mod payment;
pub mod pricing;
pub mod tax;
pub mod traits;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{Capability, IdentityContext};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order_number::OrderNumber;
pub use payment::{PaymentCalculator, TenderOptions};
pub use tax::TaxCalculator;
pub use traits::{ChangeKind, SoftDeletable, SyncRecord, TenantOwned, Timestamped};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches keying mistakes (1000 instead of 10) at the till.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum unit price in minor units (10 billion major units).
///
/// Together with [`MAX_ITEM_QUANTITY`] and [`MAX_SALE_LINES`] this keeps every
/// sale total well inside `i64`.
pub const MAX_UNIT_PRICE_CENTS: i64 = 1_000_000_000_000;

/// Upper bound for stock levels and for a single manual movement.
pub const MAX_STOCK_LEVEL: i64 = 1_000_000_000;
