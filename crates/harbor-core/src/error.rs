//! # Error Types
//!
//! Domain-specific error types for harbor-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  harbor-core errors (this file)                                        │
//! │  ├── CoreError        - Calculator and business rule failures          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  harbor-db errors                                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  harbor-engine errors                                                  │
//! │  └── EngineError      - What callers see (typed, with ErrorCode)       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;
use crate::types::PaymentKind;

// =============================================================================
// Core Error
// =============================================================================

/// Calculator and business rule errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough sellable stock.
    ///
    /// ## When This Occurs
    /// - Requested quantity (summed across lines of the same item) exceeds
    ///   `stock - reserved_stock`
    /// - A ledger movement would take stock below zero
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: String,
        requested: i64,
        available: i64,
    },

    /// Tendered amount is below the amount due.
    ///
    /// ## User Workflow
    /// ```text
    /// Due: 25000.00   Tendered: 20000.00
    ///      │
    ///      ▼
    /// InsufficientPayment { required: 25000.00, tendered: 20000.00 }
    ///      │
    ///      ▼
    /// UI shows: "Short by 5000.00"
    /// ```
    #[error("Insufficient payment: required {required}, tendered {tendered}")]
    InsufficientPayment { required: Money, tendered: Money },

    /// Card and digital payments must match the amount due exactly.
    #[error("{} payment must equal the amount due: due {due}, tendered {tendered}", kind.as_str())]
    ExactTenderRequired {
        kind: PaymentKind,
        due: Money,
        tendered: Money,
    },

    #[error("Digital payment requires a reference")]
    MissingPaymentReference,

    #[error("Card number must be 13 to 19 digits")]
    InvalidCardNumber,

    /// Cash tendered in a fraction of the smallest currency unit.
    #[error("Cash amount {amount} is not a multiple of {unit}")]
    InvalidCashDenomination { amount: Money, unit: Money },

    /// Greedy breakdown left an amount no denomination can cover.
    #[error("Cannot break {amount} into denominations: {remainder} remains")]
    Denomination { amount: Money, remainder: Money },

    #[error("Invalid order number: {0}")]
    InvalidOrderNumber(String),

    #[error("Invalid tax rate: {bps} bps")]
    InvalidTaxRate { bps: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shortfall for an insufficient payment.
    pub fn shortfall(&self) -> Option<Money> {
        match self {
            CoreError::InsufficientPayment { required, tendered } => Some(*required - *tendered),
            _ => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic or persistence runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed order number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// A referenced record does not resolve in the tenant.
    #[error("{entity} not found: {reference}")]
    UnknownReference { entity: String, reference: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
