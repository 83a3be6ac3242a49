//! # Domain Types
//!
//! Core domain types shared by the ledger, the transaction engine and the
//! sync protocol.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CatalogItem    │   │      Sale       │   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  sku, name      │   │  order_number   │   │  name           │       │
//! │  │  unit_price     │   │  status         │   │  kind           │       │
//! │  │  tracks_inv.    │   │  totals (cents) │   │  active         │       │
//! │  └────────┬────────┘   └────────┬────────┘   └─────────────────┘       │
//! │           │ 1:1                 │ 1:N                                   │
//! │  ┌────────▼────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │ InventoryRecord │   │    SaleLine     │   │    TaxRule      │       │
//! │  │  stock, minimum │◄──│  qty, line tax  │   │  rate_bps       │       │
//! │  │  reserved       │   └─────────────────┘   │  is_default     │       │
//! │  └────────┬────────┘                         └─────────────────┘       │
//! │           │ 1:N (append-only)                                           │
//! │  ┌────────▼────────┐   ┌─────────────────┐                             │
//! │  │  LedgerEntry    │   │  SyncConflict   │                             │
//! │  │  signed qty     │   │  client payload │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity carries `tenant_id`. Money columns are `*_cents: i64` with
//! [`Money`] accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1100 bps is the 11% Indonesian PPN.
/// Valid rule rates are `0 <= bps < 10000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Basis points in one whole (100%).
    pub const BPS_SCALE: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the rate as a fraction (for display only).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / Self::BPS_SCALE as f64
    }
}

// =============================================================================
// Status & Kind Enums
// =============================================================================

/// Lifecycle of a sale.
///
/// ```text
///   pending ──► completed ──┬──► voided    (within the void window)
///                           └──► refunded
/// ```
/// Every transition except `pending → completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    Pending,
    Completed,
    Voided,
    Refunded,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
            SaleStatus::Refunded => "refunded",
        }
    }

    /// Returns true when no further transition is possible.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Voided | SaleStatus::Refunded)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a payment method settles, which decides its tender rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Overpayment allowed, change returned.
    Cash,
    /// Exact amount only.
    Card,
    /// Exact amount plus a provider reference.
    Digital,
    Other,
}

impl PaymentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Cash => "cash",
            PaymentKind::Card => "card",
            PaymentKind::Digital => "digital",
            PaymentKind::Other => "other",
        }
    }
}

impl FromStr for PaymentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentKind::Cash),
            "card" => Ok(PaymentKind::Card),
            "digital" => Ok(PaymentKind::Digital),
            "other" => Ok(PaymentKind::Other),
            _ => Err(ValidationError::NotAllowed {
                field: "payment kind".to_string(),
                allowed: vec!["cash".into(), "card".into(), "digital".into(), "other".into()],
            }),
        }
    }
}

/// Kind of inventory movement recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    StockIn,
    StockOut,
    Adjustment,
}

impl MovementKind {
    /// Normalizes a caller quantity into the signed ledger quantity.
    ///
    /// `stock_in` is always positive, `stock_out` always negative and an
    /// adjustment keeps its sign. Zero is never a valid movement.
    ///
    /// ```rust
    /// use harbor_core::types::MovementKind;
    ///
    /// assert_eq!(MovementKind::StockOut.signed_quantity(3), Some(-3));
    /// assert_eq!(MovementKind::StockIn.signed_quantity(-3), Some(3));
    /// assert_eq!(MovementKind::Adjustment.signed_quantity(-2), Some(-2));
    /// assert_eq!(MovementKind::Adjustment.signed_quantity(0), None);
    /// ```
    pub fn signed_quantity(&self, quantity: i64) -> Option<i64> {
        if quantity == 0 {
            return None;
        }
        Some(match self {
            MovementKind::StockIn => quantity.abs(),
            MovementKind::StockOut => -quantity.abs(),
            MovementKind::Adjustment => quantity,
        })
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementKind::StockIn => "stock_in",
            MovementKind::StockOut => "stock_out",
            MovementKind::Adjustment => "adjustment",
        }
    }
}

/// What bulk ingestion does when an incoming order number already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Keep the stored sale; the duplicate counts as synced.
    #[default]
    ServerWins,
    /// Recorded as a pending conflict; the stored sale is never overwritten.
    ClientWins,
    /// Recorded as a pending conflict; the stored sale is never overwritten.
    LatestTimestamp,
    /// Recorded as a pending conflict for an operator.
    #[serde(alias = "manual_resolution")]
    Manual,
}

impl ConflictStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::ServerWins => "server_wins",
            ConflictStrategy::ClientWins => "client_wins",
            ConflictStrategy::LatestTimestamp => "latest_timestamp",
            ConflictStrategy::Manual => "manual",
        }
    }
}

impl FromStr for ConflictStrategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "server_wins" => Ok(ConflictStrategy::ServerWins),
            "client_wins" => Ok(ConflictStrategy::ClientWins),
            "latest_timestamp" => Ok(ConflictStrategy::LatestTimestamp),
            "manual" | "manual_resolution" => Ok(ConflictStrategy::Manual),
            _ => Err(ValidationError::NotAllowed {
                field: "conflict strategy".to_string(),
                allowed: vec![
                    "server_wins".into(),
                    "client_wins".into(),
                    "latest_timestamp".into(),
                    "manual".into(),
                ],
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    Resolved,
}

/// Operator decision for a pending sync conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    /// Discard the client copy.
    KeepServer,
    /// Create the client sale under a freshly allocated order number.
    IngestAsNew,
}

impl ConflictAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConflictAction::KeepServer => "keep_server",
            ConflictAction::IngestAsNew => "ingest_as_new",
        }
    }
}

// =============================================================================
// Resource Types
// =============================================================================

/// Syncable resource families, by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Items,
    Inventories,
    Transactions,
    PaymentMethods,
    Taxes,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Items,
        ResourceType::Inventories,
        ResourceType::Transactions,
        ResourceType::PaymentMethods,
        ResourceType::Taxes,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Items => "items",
            ResourceType::Inventories => "inventories",
            ResourceType::Transactions => "transactions",
            ResourceType::PaymentMethods => "payment_methods",
            ResourceType::Taxes => "taxes",
        }
    }

    /// Singular record name used as the `sync_id` prefix.
    pub const fn record_name(&self) -> &'static str {
        match self {
            ResourceType::Items => "item",
            ResourceType::Inventories => "inventory",
            ResourceType::Transactions => "transaction",
            ResourceType::PaymentMethods => "payment_method",
            ResourceType::Taxes => "tax",
        }
    }

    /// Parses a list of wire names. An empty list selects every resource.
    ///
    /// Duplicates collapse; order follows [`ResourceType::ALL`].
    ///
    /// ```rust
    /// use harbor_core::types::ResourceType;
    ///
    /// let all = ResourceType::parse_list::<&str>(&[]).unwrap();
    /// assert_eq!(all.len(), 5);
    ///
    /// let some = ResourceType::parse_list(&["taxes", "items", "taxes"]).unwrap();
    /// assert_eq!(some, vec![ResourceType::Items, ResourceType::Taxes]);
    ///
    /// assert!(ResourceType::parse_list(&["users"]).is_err());
    /// ```
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<ResourceType>, ValidationError> {
        if names.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        let mut selected = names
            .iter()
            .map(|name| name.as_ref().parse::<ResourceType>())
            .collect::<Result<Vec<_>, _>>()?;
        selected.sort();
        selected.dedup();
        Ok(selected)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == name)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: format!("resource type '{}'", name),
                allowed: Self::ALL.iter().map(|r| r.as_str().to_string()).collect(),
            })
    }
}

/// Freshness of a (tenant, actor) sync cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum SyncHealth {
    NeverSynced,
    Outdated,
    Stale,
    Healthy,
}

// =============================================================================
// Payment Method
// =============================================================================

/// A tenant payment method. Name and kind are frozen once a completed
/// sale references it; only `active` may change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub kind: PaymentKind,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PaymentMethod {
    /// Usable for new sales.
    pub fn is_usable(&self) -> bool {
        self.active && self.deleted_at.is_none()
    }
}

// =============================================================================
// Tax Rule
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TaxRule {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub rate_bps: u32,
    /// At most one default rule per tenant.
    pub is_default: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TaxRule {
    #[inline]
    pub fn rate(&self) -> TaxRate {
        TaxRate::from_bps(self.rate_bps)
    }
}

// =============================================================================
// Catalog Item
// =============================================================================

/// A sellable item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub tenant_id: String,
    pub sku: String,
    pub name: String,
    /// Always positive.
    pub unit_price_cents: i64,
    /// Tracked items own exactly one inventory record.
    pub tracks_inventory: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CatalogItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Inventory Record
// =============================================================================

/// Stock for one tracked catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: String,
    pub tenant_id: String,
    pub item_id: String,
    pub stock: i64,
    pub minimum_stock: i64,
    pub reserved_stock: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    /// Stock that can still be sold.
    #[inline]
    pub fn available_stock(&self) -> i64 {
        self.stock - self.reserved_stock
    }

    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.minimum_stock
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// One append-only inventory movement.
///
/// The sum of `quantity` over an item's entries equals its stock.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub tenant_id: String,
    pub item_id: String,
    pub movement_kind: MovementKind,
    /// Signed quantity.
    pub quantity: i64,
    pub line_item_id: Option<String>,
    pub note: String,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A sale transaction header.
///
/// `grand_total = sub_total - discount + tax`, and once completed
/// `paid >= grand_total`. Both are also table CHECK constraints.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub order_number: String,
    pub payment_method_id: String,
    pub tax_rule_id: Option<String>,
    /// Rate snapshot at sale time; 0 when no tax applied.
    pub tax_rate_bps: u32,
    pub sub_total_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub grand_total_cents: i64,
    pub paid_cents: i64,
    pub change_cents: i64,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub void_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
    pub refund_cents: Option<i64>,
    pub refund_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub device_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn sub_total(&self) -> Money {
        Money::from_cents(self.sub_total_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn change(&self) -> Money {
        Money::from_cents(self.change_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item. Unit price is frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub id: String,
    pub tenant_id: String,
    pub sale_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `unit_price × quantity`.
    pub line_total_cents: i64,
    /// Share of the sale tax, by line-total share.
    pub tax_cents: i64,
    #[ts(as = "Option<String>")]
    pub refunded_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    /// Amount returned to the customer when this line is refunded.
    #[inline]
    pub fn refundable_amount(&self) -> Money {
        self.line_total() + self.tax()
    }
}

/// A sale with its lines, as returned by lookups.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleWithLines {
    #[serde(flatten)]
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// Sync Conflict
// =============================================================================

/// An offline sale whose order number collided with a stored sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: String,
    pub tenant_id: String,
    pub order_number: String,
    pub existing_sale_id: String,
    pub strategy: ConflictStrategy,
    /// The client entry as received, JSON encoded.
    pub client_payload: String,
    pub status: ConflictStatus,
    pub resolution: Option<String>,
    pub resolved_sale_id: Option<String>,
    pub resolved_by: Option<String>,
    pub device_id: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Sync State
// =============================================================================

/// Per (tenant, actor) sync cursor and full-export throttle.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub tenant_id: String,
    pub actor_id: String,
    #[ts(as = "Option<String>")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub last_full_export_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
