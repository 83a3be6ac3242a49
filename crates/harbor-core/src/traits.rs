//! # Record Traits
//!
//! Small capabilities shared by the syncable entities, implemented per type
//! instead of through a common base record.
//!
//! ```text
//! ┌──────────────────┬────────────┬───────────────┬─────────────┬────────────┐
//! │ Entity           │ TenantOwned│ SoftDeletable │ Timestamped │ SyncRecord │
//! ├──────────────────┼────────────┼───────────────┼─────────────┼────────────┤
//! │ CatalogItem      │     ✓      │       ✓       │      ✓      │ items      │
//! │ InventoryRecord  │     ✓      │       ✓       │      ✓      │ inventories│
//! │ Sale             │     ✓      │       ✓       │      ✓      │ transactions│
//! │ PaymentMethod    │     ✓      │       ✓       │      ✓      │ payment_m. │
//! │ TaxRule          │     ✓      │       ✓       │      ✓      │ taxes      │
//! └──────────────────┴────────────┴───────────────┴─────────────┴────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{CatalogItem, InventoryRecord, PaymentMethod, ResourceType, Sale, TaxRule};

pub trait TenantOwned {
    fn tenant_id(&self) -> &str;

    fn belongs_to(&self, tenant_id: &str) -> bool {
        self.tenant_id() == tenant_id
    }
}

pub trait SoftDeletable {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

pub trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
}

/// How a record changed relative to a sync cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A record exported through delta and full sync.
pub trait SyncRecord: TenantOwned + SoftDeletable + Timestamped {
    const RESOURCE: ResourceType;

    fn record_id(&self) -> &str;

    /// `{record}_{id}_{updated_at unix seconds}`.
    fn sync_id(&self) -> String {
        format!(
            "{}_{}_{}",
            Self::RESOURCE.record_name(),
            self.record_id(),
            self.updated_at().timestamp()
        )
    }

    fn last_modified(&self) -> DateTime<Utc> {
        match self.deleted_at() {
            Some(deleted_at) if deleted_at > self.updated_at() => deleted_at,
            _ => self.updated_at(),
        }
    }

    /// Classifies the record against `since`.
    ///
    /// - deleted: `deleted_at > since`
    /// - created: `created_at > since`, not deleted
    /// - updated: `created_at <= since < updated_at`, not deleted
    ///
    /// Records untouched since the cursor, or deleted before it, yield `None`.
    fn change_since(&self, since: DateTime<Utc>) -> Option<ChangeKind> {
        match self.deleted_at() {
            Some(deleted_at) if deleted_at > since => Some(ChangeKind::Deleted),
            Some(_) => None,
            None if self.created_at() > since => Some(ChangeKind::Created),
            None if self.updated_at() > since => Some(ChangeKind::Updated),
            None => None,
        }
    }
}

macro_rules! impl_record_traits {
    ($ty:ty, $resource:expr) => {
        impl TenantOwned for $ty {
            fn tenant_id(&self) -> &str {
                &self.tenant_id
            }
        }

        impl SoftDeletable for $ty {
            fn deleted_at(&self) -> Option<DateTime<Utc>> {
                self.deleted_at
            }
        }

        impl Timestamped for $ty {
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
        }

        impl SyncRecord for $ty {
            const RESOURCE: ResourceType = $resource;

            fn record_id(&self) -> &str {
                &self.id
            }
        }
    };
}

impl_record_traits!(CatalogItem, ResourceType::Items);
impl_record_traits!(InventoryRecord, ResourceType::Inventories);
impl_record_traits!(Sale, ResourceType::Transactions);
impl_record_traits!(PaymentMethod, ResourceType::PaymentMethods);
impl_record_traits!(TaxRule, ResourceType::Taxes);
