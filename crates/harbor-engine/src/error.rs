//! # Engine Error Types
//!
//! Typed failures of the transaction and sync engines.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Input          │  │  Business rule  │  │  Sync policy            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  InsufficientSt.│  │  PermissionDenied       │ │
//! │  │  NotFound       │  │  InsufficientPay│  │  RateLimited            │ │
//! │  │  InvalidPayment │  │  NotVoidable    │  │  PayloadTooLarge        │ │
//! │  │  Method         │  │  NotRefundable  │  │  BatchAborted           │ │
//! │  │                 │  │  Conflict       │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Allocation, System: logged with context, generic to callers    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expected failures never leave partial state: every mutating operation
//! runs in one database transaction that is dropped (rolled back) on error.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use harbor_core::{Capability, CoreError, Money, PaymentKind, ValidationError};
use harbor_db::DbError;

use crate::protocol::IngestReport;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Message exposed for every unexpected failure.
const SYSTEM_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or out-of-range input.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// ## When This Occurs
    /// - Method doesn't exist in the tenant
    /// - Method is inactive or soft-deleted
    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: String,
        requested: i64,
        available: i64,
    },

    #[error("Insufficient payment: required {required}, tendered {tendered}, short by {shortfall}")]
    InsufficientPayment {
        required: Money,
        tendered: Money,
        shortfall: Money,
    },

    /// ## When This Occurs
    /// - Sale is not `completed`
    /// - Void window has passed
    #[error("Sale {sale_id} cannot be voided: {reason}")]
    NotVoidable { sale_id: String, reason: String },

    #[error("Sale {sale_id} cannot be refunded: {reason}")]
    NotRefundable { sale_id: String, reason: String },

    /// ## When This Occurs
    /// - Client-supplied order number already used in the tenant
    /// - Concurrent change to a record being transitioned
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Missing capability: {capability}")]
    PermissionDenied { capability: Capability },

    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Payload too large: {size} entries, maximum is {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Failure ratio over the threshold; nothing from the batch was kept.
    #[error(
        "Batch aborted: {} of {} entries failed",
        .0.failed_syncs,
        .0.total_transactions
    )]
    BatchAborted(Box<IngestReport>),

    /// Order number could not be allocated within the retry budget, or the
    /// day's sequence is exhausted.
    #[error("Could not allocate an order number after {attempts} attempts")]
    Allocation { attempts: u32 },

    #[error("{0}")]
    System(String),
}

impl EngineError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Logs the detail and returns the generic `System` error.
    pub fn system(context: &str, detail: impl std::fmt::Display) -> Self {
        error!(context, error = %detail, "Unexpected engine failure");
        EngineError::System(SYSTEM_MESSAGE.to_string())
    }

    /// Machine-readable code for the wire envelope.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::InvalidPaymentMethod(_) => ErrorCode::InvalidPaymentMethod,
            EngineError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            EngineError::InsufficientPayment { .. } => ErrorCode::InsufficientPayment,
            EngineError::NotVoidable { .. } => ErrorCode::NotVoidable,
            EngineError::NotRefundable { .. } => ErrorCode::NotRefundable,
            EngineError::Conflict(_) => ErrorCode::Conflict,
            EngineError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            EngineError::RateLimited { .. } => ErrorCode::RateLimited,
            EngineError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            EngineError::BatchAborted(_) => ErrorCode::BatchAborted,
            EngineError::Allocation { .. } => ErrorCode::AllocationFailed,
            EngineError::System(_) => ErrorCode::SystemError,
        }
    }
}

/// Wire error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InvalidPaymentMethod,
    InsufficientStock,
    InsufficientPayment,
    NotVoidable,
    NotRefundable,
    Conflict,
    PermissionDenied,
    RateLimited,
    PayloadTooLarge,
    BatchAborted,
    AllocationFailed,
    SystemError,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                item_id,
                requested,
                available,
            } => EngineError::InsufficientStock {
                item_id,
                requested,
                available,
            },
            CoreError::InsufficientPayment { required, tendered } => EngineError::InsufficientPayment {
                required,
                tendered,
                shortfall: required - tendered,
            },
            // Under-tendering a card or digital payment is still a shortfall
            CoreError::ExactTenderRequired { due, tendered, .. } if tendered < due => {
                EngineError::InsufficientPayment {
                    required: due,
                    tendered,
                    shortfall: due - tendered,
                }
            }
            other => EngineError::Validation(other.to_string()),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => {
                EngineError::Conflict(format!("{field} '{value}' already exists"))
            }
            DbError::StockUnderflow {
                item_id,
                delta,
                available,
            } => EngineError::InsufficientStock {
                item_id,
                requested: delta.abs(),
                available,
            },
            DbError::Immutable { entity, id, reason } => {
                EngineError::Conflict(format!("{entity} {id}: {reason}"))
            }
            other => EngineError::system("database", other),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::from(DbError::from(err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::system("serialization", err)
    }
}

/// Helper for payment-kind specific messages.
pub(crate) fn inactive_method(name: &str, kind: PaymentKind) -> EngineError {
    EngineError::InvalidPaymentMethod(format!("{} method '{}' is not active", kind.as_str(), name))
}

// =============================================================================
// Configuration Error
// =============================================================================

/// Engine configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load config: {0}")]
    LoadFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
