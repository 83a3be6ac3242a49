//! # Demo Tenant Seeder
//!
//! Populates a database with a small demo tenant for development.
//!
//! ## Usage
//! ```bash
//! # Seed tenant "demo" into ./harbor_dev.db
//! cargo run -p harbor-db --bin seed
//!
//! # Custom tenant and path
//! cargo run -p harbor-db --bin seed -- --tenant toko-1 --db ./data/harbor.db
//! ```
//!
//! ## What Gets Created
//! - Payment methods: Tunai (cash), Kartu Debit (card), QRIS (digital)
//! - Default tax rule PPN 11%
//! - Catalog items across a few categories, tracked ones with opening stock

use chrono::Utc;
use std::env;
use uuid::Uuid;

use harbor_core::tax::{DEFAULT_TAX_NAME, DEFAULT_TAX_RATE_BPS};
use harbor_core::{CatalogItem, PaymentKind, PaymentMethod, TaxRule};
use harbor_db::{
    CatalogRepository, Database, DbConfig, InventoryRepository, PaymentMethodRepository, TaxRuleRepository,
};

const SEED_ACTOR: &str = "seed";

/// (sku prefix, name, price in rupiah, opening stock; None = untracked)
const ITEMS: &[(&str, &str, i64, Option<i64>)] = &[
    ("BEV", "Kopi Susu", 18_000, Some(120)),
    ("BEV", "Es Teh Manis", 5_000, Some(200)),
    ("BEV", "Air Mineral 600ml", 3_000, Some(300)),
    ("SNK", "Keripik Singkong", 8_500, Some(60)),
    ("SNK", "Roti Bakar", 12_000, Some(40)),
    ("GRC", "Beras 5kg", 70_000, Some(25)),
    ("GRC", "Minyak Goreng 1L", 20_000, Some(50)),
    ("GRC", "Gula Pasir 1kg", 15_000, Some(45)),
    ("SVC", "Biaya Antar", 10_000, None),
    ("SVC", "Bungkus Kado", 5_000, None),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut tenant_id = String::from("demo");
    let mut db_path = String::from("./harbor_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Harbor POS demo seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --tenant <ID>  Tenant to seed (default: demo)");
                println!("  -d, --db <PATH>    Database file path (default: ./harbor_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Harbor POS demo seeder");
    println!("======================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let mut tx = db.begin().await?;

    if !CatalogRepository::new(&mut tx).list(&tenant_id, true, Some(1)).await?.is_empty() {
        println!("⚠ Tenant {} already has catalog items, skipping.", tenant_id);
        return Ok(());
    }

    let now = Utc::now();

    for (name, kind) in [
        ("Tunai", PaymentKind::Cash),
        ("Kartu Debit", PaymentKind::Card),
        ("QRIS", PaymentKind::Digital),
    ] {
        PaymentMethodRepository::new(&mut tx)
            .insert(&PaymentMethod {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.clone(),
                name: name.to_string(),
                kind,
                active: true,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            })
            .await?;
    }
    println!("✓ Payment methods");

    TaxRuleRepository::new(&mut tx)
        .insert(&TaxRule {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.clone(),
            name: DEFAULT_TAX_NAME.to_string(),
            rate_bps: DEFAULT_TAX_RATE_BPS,
            is_default: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
        .await?;
    println!("✓ Default tax rule {}", DEFAULT_TAX_NAME);

    for (idx, (prefix, name, price, opening)) in ITEMS.iter().enumerate() {
        let item = CatalogItem {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.clone(),
            sku: format!("{}-{:03}", prefix, idx + 1),
            name: name.to_string(),
            unit_price_cents: price * 100,
            tracks_inventory: opening.is_some(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        CatalogRepository::new(&mut tx).insert(&item).await?;

        if let Some(stock) = opening {
            InventoryRepository::new(&mut tx)
                .open(&tenant_id, &item.id, *stock, stock / 10, SEED_ACTOR, now)
                .await?;
        }
    }
    println!("✓ {} catalog items", ITEMS.len());

    tx.commit().await?;

    println!();
    println!("✓ Seed complete!");
    Ok(())
}
