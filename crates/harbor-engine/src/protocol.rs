//! # Wire Protocol
//!
//! Request and response shapes of the engine-facing API. All JSON is
//! camelCase and money travels as integer minor units.
//!
//! ## Envelope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ { "success": true,                                                      │
//! │   "message": "Transaction created",                                     │
//! │   "data":    { ... },              ◄── operation result                 │
//! │   "timestamp": "2024-03-15T09:30:00Z" }                                 │
//! │                                                                         │
//! │ { "success": false,                                                     │
//! │   "message": "Insufficient stock for item ...",                         │
//! │   "errors":  ["..."],                                                   │
//! │   "code":    "INSUFFICIENT_STOCK",  ◄── ErrorCode                       │
//! │   "data":    { ... },               ◄── only for BATCH_ABORTED (report) │
//! │   "timestamp": "..." }                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sync Flow
//! ```text
//! POS (offline) ── sells, queues sales locally
//!      │
//!      │  back online
//!      ▼
//! POST /sync/transactions ──► BulkIngestRequest ──► IngestReport
//! GET  /sync/delta        ──► DeltaResponse     (created/updated/deleted)
//! POST /sync/full         ──► FullExportResponse (rate limited)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use harbor_core::payment::DenominationCount;
use harbor_core::{ConflictAction, ConflictStrategy, Money, ResourceType, SaleWithLines, SyncHealth, TenderOptions};

use crate::error::{EngineError, ErrorCode};

// =============================================================================
// Envelope
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub timestamp: DateTime<Utc>,
}

impl<T> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T, at: DateTime<Utc>) -> Self {
        Envelope {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
            code: None,
            timestamp: at,
        }
    }
}

impl Envelope<Value> {
    /// Failure envelope. An aborted batch carries its report as `data`.
    pub fn from_error(err: &EngineError, at: DateTime<Utc>) -> Self {
        let data = match err {
            EngineError::BatchAborted(report) => serde_json::to_value(report.as_ref()).ok(),
            _ => None,
        };
        let errors = match err {
            EngineError::BatchAborted(report) => report.errors.iter().map(|e| e.error.clone()).collect(),
            other => vec![other.to_string()],
        };
        Envelope {
            success: false,
            message: err.to_string(),
            data,
            errors: Some(errors),
            code: Some(err.code()),
            timestamp: at,
        }
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineInput {
    pub item_id: String,
    pub quantity: i64,
    /// Defaults to the catalog price.
    #[serde(default)]
    pub unit_price: Option<Money>,
}

/// Optional parts of a sale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSaleOptions {
    pub discount: Money,
    pub tax_rule_id: Option<String>,
    /// Applies the tenant default rule (or the system default) when no
    /// explicit rule is given.
    pub apply_default_tax: bool,
    pub notes: Option<String>,
    pub method_options: TenderOptions,
    /// Client-assigned order number (offline sales). A collision is a conflict.
    pub order_number: Option<String>,
    /// Client creation time (offline sales).
    pub created_at: Option<DateTime<Utc>>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub lines: Vec<SaleLineInput>,
    pub payment_method_id: String,
    pub tendered: Money,
    #[serde(default)]
    pub options: CreateSaleOptions,
}

/// A completed sale with the change owed to the customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    pub sale: SaleWithLines,
    pub change: Money,
    /// Cash sales only. `None` when the change can't be expressed in notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_breakdown: Option<Vec<DenominationCount>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// Lines to refund. Empty refunds the whole sale.
    #[serde(default)]
    pub line_ids: Vec<String>,
    pub reason: String,
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub due: Money,
    pub tendered: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeResponse {
    pub change: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<DenominationCount>>,
}

/// One leg of a split payment, by payment method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderInput {
    pub payment_method_id: String,
    pub amount: Money,
    #[serde(default)]
    pub options: TenderOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitTenderRequest {
    pub due: Money,
    pub tenders: Vec<TenderInput>,
}

// =============================================================================
// Delta & Full Export
// =============================================================================

/// Changes of one resource family since a cursor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDelta {
    pub created: Vec<Value>,
    pub updated: Vec<Value>,
    pub deleted: Vec<Value>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaResponse {
    pub resources: BTreeMap<ResourceType, ResourceDelta>,
    pub total_changes: usize,
    pub sync_timestamp: DateTime<Utc>,
    pub next_sync_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FullExportRequest {
    /// Wire names; empty selects every resource.
    pub resource_types: Vec<String>,
    pub include_deleted: bool,
    /// Per-resource cap. Absent means every record.
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullExportResponse {
    pub data: BTreeMap<ResourceType, Vec<Value>>,
    pub sync_timestamp: DateTime<Utc>,
    pub sync_token: String,
    pub total_records: usize,
}

// =============================================================================
// Bulk Ingestion
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestItem {
    pub item_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<Money>,
}

/// One offline sale as sent by a POS. Required fields are optional here so
/// that missing ones are reported per entry instead of rejecting the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestTransaction {
    /// Client-side identifier, echoed back in errors.
    pub transaction_id: Option<String>,
    pub order_number: Option<String>,
    pub items: Option<Vec<IngestItem>>,
    /// Payment method id or name.
    pub payment_method: Option<String>,
    pub paid_amount: Option<Money>,
    pub discount: Option<Money>,
    pub tax_rule_id: Option<String>,
    pub apply_default_tax: bool,
    pub notes: Option<String>,
    pub method_options: TenderOptions,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkIngestRequest {
    pub transactions: Vec<IngestTransaction>,
    #[serde(default)]
    pub client_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub sync_token: Option<String>,
    /// Falls back to the configured default.
    #[serde(default)]
    pub conflict_strategy: Option<ConflictStrategy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// A new sale was stored.
    Created,
    /// Duplicate order number; the stored sale was kept (`server_wins`).
    ServerKept,
    /// Duplicate order number recorded as a pending conflict.
    Unresolved,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub index: usize,
    pub transaction_id: Option<String>,
    pub order_number: Option<String>,
    pub status: IngestStatus,
    pub sale_id: Option<String>,
    pub conflict_id: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestError {
    pub index: usize,
    pub transaction_id: Option<String>,
    pub order_number: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub total_transactions: usize,
    pub successful_syncs: usize,
    pub failed_syncs: usize,
    /// Entries recorded as pending conflicts.
    pub conflicts: usize,
    pub errors: Vec<IngestError>,
    pub outcomes: Vec<IngestOutcome>,
    pub processing_time_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub transactions: Vec<IngestTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryValidation {
    pub index: usize,
    pub transaction_id: Option<String>,
    pub order_number: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub errors: Vec<EntryValidation>,
    pub estimated_processing_seconds: f64,
}

// =============================================================================
// Status & Conflicts
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub pending_conflicts: i64,
    pub health: SyncHealth,
    pub available_resources: Vec<ResourceType>,
    pub server_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub conflict_id: String,
    pub action: ConflictAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveConflictsRequest {
    pub resolutions: Vec<ConflictResolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub conflict_id: String,
    pub action: ConflictAction,
    pub success: bool,
    pub resolved_sale_id: Option<String>,
    pub order_number: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub resolved: usize,
    pub failed: usize,
    pub results: Vec<ResolutionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub removed_conflicts: u64,
    pub cutoff: DateTime<Utc>,
}
