//! Shared fixtures for engine tests: an in-memory database with one seeded
//! tenant, a manual clock and a recording audit sink.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use harbor_core::{CatalogItem, IdentityContext, ManualClock, Money, PaymentKind, PaymentMethod, TaxRule};
use harbor_db::{
    CatalogRepository, Database, DbConfig, InventoryRepository, PaymentMethodRepository, TaxRuleRepository,
};

use crate::audit::MemoryAuditSink;
use crate::config::EngineConfig;
use crate::protocol::{CreateSaleOptions, CreateSaleRequest, SaleLineInput};
use crate::transaction::TransactionEngine;

pub const TENANT: &str = "toko-1";
pub const ACTOR: &str = "kasir-1";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
}

pub fn ctx() -> IdentityContext {
    IdentityContext::new(TENANT, ACTOR).with_all_capabilities()
}

pub struct Fixture {
    pub engine: TransactionEngine,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<MemoryAuditSink>,
    pub cash: String,
    pub card: String,
    pub qris: String,
    /// Rp 10.000, tracked, 10 in stock.
    pub kopi: String,
    /// Rp 5.000, tracked, 5 in stock.
    pub roti: String,
    /// Rp 100.000, untracked.
    pub paket: String,
    /// Default rule, 11%.
    pub ppn: String,
}

pub async fn fixture() -> Fixture {
    fixture_with(EngineConfig::default()).await
}

pub async fn fixture_with(config: EngineConfig) -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let audit = Arc::new(MemoryAuditSink::new());
    let seeded_at = start() - Duration::days(1);

    let mut tx = db.begin().await.unwrap();
    let cash = method(&mut tx, "Tunai", PaymentKind::Cash, seeded_at).await;
    let card = method(&mut tx, "Kartu Debit", PaymentKind::Card, seeded_at).await;
    let qris = method(&mut tx, "QRIS", PaymentKind::Digital, seeded_at).await;
    let kopi = item(&mut tx, "BEV-001", 10_000, Some(10), seeded_at).await;
    let roti = item(&mut tx, "SNK-001", 5_000, Some(5), seeded_at).await;
    let paket = item(&mut tx, "SVC-001", 100_000, None, seeded_at).await;

    let rule = TaxRule {
        id: Uuid::new_v4().to_string(),
        tenant_id: TENANT.to_string(),
        name: "PPN".to_string(),
        rate_bps: 1100,
        is_default: true,
        created_at: seeded_at,
        updated_at: seeded_at,
        deleted_at: None,
    };
    TaxRuleRepository::new(&mut tx).insert(&rule).await.unwrap();
    tx.commit().await.unwrap();

    let engine = TransactionEngine::new(db, config)
        .unwrap()
        .with_clock(clock.clone())
        .with_audit_sink(audit.clone());

    Fixture {
        engine,
        clock,
        audit,
        cash,
        card,
        qris,
        kopi,
        roti,
        paket,
        ppn: rule.id,
    }
}

async fn method(conn: &mut sqlx::SqliteConnection, name: &str, kind: PaymentKind, at: DateTime<Utc>) -> String {
    let method = PaymentMethod {
        id: Uuid::new_v4().to_string(),
        tenant_id: TENANT.to_string(),
        name: name.to_string(),
        kind,
        active: true,
        created_at: at,
        updated_at: at,
        deleted_at: None,
    };
    PaymentMethodRepository::new(conn).insert(&method).await.unwrap();
    method.id
}

pub async fn item(
    conn: &mut sqlx::SqliteConnection,
    sku: &str,
    price_major: i64,
    stock: Option<i64>,
    at: DateTime<Utc>,
) -> String {
    let item = CatalogItem {
        id: Uuid::new_v4().to_string(),
        tenant_id: TENANT.to_string(),
        sku: sku.to_string(),
        name: sku.to_string(),
        unit_price_cents: Money::from_major(price_major).cents(),
        tracks_inventory: stock.is_some(),
        created_at: at,
        updated_at: at,
        deleted_at: None,
    };
    CatalogRepository::new(&mut *conn).insert(&item).await.unwrap();
    if let Some(stock) = stock {
        InventoryRepository::new(conn)
            .open(TENANT, &item.id, stock, 2, ACTOR, at)
            .await
            .unwrap();
    }
    item.id
}

pub fn line(item_id: &str, quantity: i64) -> SaleLineInput {
    SaleLineInput {
        item_id: item_id.to_string(),
        quantity,
        unit_price: None,
    }
}

pub fn sale(lines: Vec<SaleLineInput>, payment_method_id: &str, tendered_major: i64) -> CreateSaleRequest {
    CreateSaleRequest {
        lines,
        payment_method_id: payment_method_id.to_string(),
        tendered: Money::from_major(tendered_major),
        options: CreateSaleOptions::default(),
    }
}

impl Fixture {
    pub async fn stock(&self, item_id: &str) -> i64 {
        let mut conn = self.engine.db().acquire().await.unwrap();
        InventoryRepository::new(&mut conn)
            .get_for_item(TENANT, item_id)
            .await
            .unwrap()
            .map(|r| r.stock)
            .unwrap_or_default()
    }
}
