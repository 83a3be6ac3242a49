//! Stock operations outside of sales: opening stock, manual movements,
//! level changes, reconciliation and the low-stock listing.
//!
//! Every stock change goes through the ledger, so `Σ ledger == stock` holds
//! for each item after any of these calls.

use serde_json::json;
use tracing::info;

use harbor_core::validation::{validate_movement_quantity, validate_reason, validate_stock_level};
use harbor_core::{IdentityContext, InventoryRecord, LedgerEntry, MovementKind};
use harbor_db::{CatalogRepository, InventoryRepository, MovementRequest, Reconciliation};

use crate::error::{EngineError, EngineResult};
use crate::transaction::TransactionEngine;

const RESOURCE: &str = "inventory";

impl TransactionEngine {
    /// Starts tracking an item with an opening `stock_in` entry.
    pub async fn open_inventory(
        &self,
        ctx: &IdentityContext,
        item_id: &str,
        opening_stock: i64,
        minimum_stock: i64,
    ) -> EngineResult<InventoryRecord> {
        let result = self.open_gated(ctx, item_id, opening_stock, minimum_stock).await;
        self.audit_outcome(ctx, "inventory.open", RESOURCE, Some(item_id), &result, |record| {
            json!({ "stock": record.stock, "minimumStock": record.minimum_stock })
        });
        result
    }

    async fn open_gated(
        &self,
        ctx: &IdentityContext,
        item_id: &str,
        opening_stock: i64,
        minimum_stock: i64,
    ) -> EngineResult<InventoryRecord> {
        validate_stock_level("opening stock", opening_stock)?;
        validate_stock_level("minimum stock", minimum_stock)?;

        let _gate = self.locks.lock(&ctx.tenant_id).await;
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let item = CatalogRepository::new(&mut tx)
            .get(&ctx.tenant_id, item_id)
            .await?
            .ok_or_else(|| EngineError::not_found("CatalogItem", item_id))?;
        if !item.tracks_inventory {
            return Err(EngineError::Validation(format!(
                "Item {} does not track inventory",
                item.sku
            )));
        }

        let record = InventoryRepository::new(&mut tx)
            .open(&ctx.tenant_id, item_id, opening_stock, minimum_stock, &ctx.actor_id, now)
            .await?;
        tx.commit().await?;

        info!(tenant_id = %ctx.tenant_id, item_id, stock = record.stock, "Inventory opened");
        Ok(record)
    }

    /// Records a manual movement. `stock_in` and `stock_out` take a
    /// magnitude; an adjustment keeps its sign.
    pub async fn adjust_stock(
        &self,
        ctx: &IdentityContext,
        item_id: &str,
        kind: MovementKind,
        quantity: i64,
        note: &str,
    ) -> EngineResult<LedgerEntry> {
        let result = self.adjust_gated(ctx, item_id, kind, quantity, note).await;
        self.audit_outcome(ctx, "inventory.movement", RESOURCE, Some(item_id), &result, |entry| {
            json!({
                "kind": entry.movement_kind.as_str(),
                "quantity": entry.quantity,
                "note": entry.note,
            })
        });
        result
    }

    async fn adjust_gated(
        &self,
        ctx: &IdentityContext,
        item_id: &str,
        kind: MovementKind,
        quantity: i64,
        note: &str,
    ) -> EngineResult<LedgerEntry> {
        validate_movement_quantity(quantity)?;
        validate_reason(note)?;

        let _gate = self.locks.lock(&ctx.tenant_id).await;
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let entry = InventoryRepository::new(&mut tx)
            .record_movement(&MovementRequest {
                tenant_id: ctx.tenant_id.clone(),
                item_id: item_id.to_string(),
                kind,
                quantity,
                line_item_id: None,
                note: note.trim().to_string(),
                created_by: ctx.actor_id.clone(),
                at: now,
            })
            .await?;
        tx.commit().await?;

        info!(
            tenant_id = %ctx.tenant_id,
            item_id,
            kind = kind.as_str(),
            quantity = entry.quantity,
            "Stock adjusted"
        );
        Ok(entry)
    }

    /// Changes minimum and reserved levels without moving stock.
    pub async fn set_stock_levels(
        &self,
        ctx: &IdentityContext,
        item_id: &str,
        minimum_stock: i64,
        reserved_stock: i64,
    ) -> EngineResult<InventoryRecord> {
        validate_stock_level("minimum stock", minimum_stock)?;
        validate_stock_level("reserved stock", reserved_stock)?;

        let _gate = self.locks.lock(&ctx.tenant_id).await;
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let mut repo = InventoryRepository::new(&mut tx);
        repo.set_levels(&ctx.tenant_id, item_id, minimum_stock, reserved_stock, now)
            .await?;
        let record = repo
            .get_for_item(&ctx.tenant_id, item_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Inventory", item_id))?;
        tx.commit().await?;
        Ok(record)
    }

    pub async fn reconcile(&self, ctx: &IdentityContext, item_id: &str) -> EngineResult<Reconciliation> {
        let mut conn = self.db.acquire().await?;
        Ok(InventoryRepository::new(&mut conn)
            .reconcile(&ctx.tenant_id, item_id)
            .await?)
    }

    /// Tracked items at or below their minimum level, lowest stock first.
    pub async fn low_stock(&self, ctx: &IdentityContext) -> EngineResult<Vec<InventoryRecord>> {
        let mut conn = self.db.acquire().await?;
        Ok(InventoryRepository::new(&mut conn).low_stock(&ctx.tenant_id).await?)
    }

    pub async fn ledger(&self, ctx: &IdentityContext, item_id: &str) -> EngineResult<Vec<LedgerEntry>> {
        let mut conn = self.db.acquire().await?;
        Ok(InventoryRepository::new(&mut conn)
            .ledger_for_item(&ctx.tenant_id, item_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ctx, fixture, line, sale};
    use harbor_core::Clock;

    #[tokio::test]
    async fn test_manual_movements_keep_ledger_consistent() {
        let fx = fixture().await;

        fx.engine
            .adjust_stock(&ctx(), &fx.kopi, MovementKind::StockIn, 5, "Restock supplier")
            .await
            .unwrap();
        let out = fx
            .engine
            .adjust_stock(&ctx(), &fx.kopi, MovementKind::StockOut, 3, "Damaged")
            .await
            .unwrap();
        assert_eq!(out.quantity, -3);
        fx.engine
            .adjust_stock(&ctx(), &fx.kopi, MovementKind::Adjustment, -2, "Stock count")
            .await
            .unwrap();

        assert_eq!(fx.stock(&fx.kopi).await, 10);
        let check = fx.engine.reconcile(&ctx(), &fx.kopi).await.unwrap();
        assert!(check.consistent);
        assert_eq!(check.ledger_total, 10);
        assert_eq!(fx.engine.ledger(&ctx(), &fx.kopi).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_movement_below_zero_is_rejected() {
        let fx = fixture().await;
        let err = fx
            .engine
            .adjust_stock(&ctx(), &fx.roti, MovementKind::Adjustment, -6, "Stock count")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStock { available: 5, .. }));
        assert_eq!(fx.stock(&fx.roti).await, 5);

        let err = fx
            .engine
            .adjust_stock(&ctx(), &fx.roti, MovementKind::Adjustment, 0, "noop")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        for quantity in [i64::MIN, i64::MAX] {
            let err = fx
                .engine
                .adjust_stock(&ctx(), &fx.roti, MovementKind::StockIn, quantity, "Delivery")
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)));
        }
        assert_eq!(fx.stock(&fx.roti).await, 5);
    }

    #[tokio::test]
    async fn test_open_inventory_requires_tracked_item() {
        let fx = fixture().await;
        let err = fx.engine.open_inventory(&ctx(), &fx.paket, 3, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = fx.engine.open_inventory(&ctx(), &fx.kopi, 3, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_low_stock_after_sales() {
        let fx = fixture().await;
        assert!(fx.engine.low_stock(&ctx()).await.unwrap().is_empty());

        fx.engine
            .create(&ctx(), &sale(vec![line(&fx.roti, 3)], &fx.cash, 15_000))
            .await
            .unwrap();

        let low = fx.engine.low_stock(&ctx()).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].item_id, fx.roti);
        assert!(low[0].is_low_stock());
    }

    #[tokio::test]
    async fn test_reserved_stock_limits_sales() {
        let fx = fixture().await;
        let record = fx.engine.set_stock_levels(&ctx(), &fx.roti, 1, 4).await.unwrap();
        assert_eq!(record.available_stock(), 1);
        assert!(record.updated_at == fx.clock.now());

        let err = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.roti, 2)], &fx.cash, 10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStock { available: 1, .. }));
    }
}
