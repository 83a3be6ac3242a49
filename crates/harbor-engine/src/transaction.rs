//! # Transaction Engine
//!
//! Creates, voids and refunds sales. Owns the sale state machine and keeps
//! stock, ledger and sale rows consistent.
//!
//! ## Create Flow
//! ```text
//! create(ctx, request)
//!   │
//!   ├─► tenant gate ──► BEGIN
//!   │
//!   │   1. payment method usable?            else InvalidPaymentMethod
//!   │   2. price lines from the catalog       else NotFound
//!   │   3. resolve tax, compute totals
//!   │   4. tracked stock available?           else InsufficientStock
//!   │   5. tender valid for method kind?      else InsufficientPayment / Validation
//!   │   ── nothing written above this line ──
//!   │   6. allocate order number, insert pending sale + lines
//!   │   7. stock_out ledger entry per tracked line
//!   │   8. pending → completed, change recorded
//!   │
//!   └─► COMMIT ──► audit event
//! ```
//!
//! Any failure drops the transaction, so a failed create leaves nothing
//! behind. The same [`TransactionEngine::create_in`] runs inside bulk
//! ingestion savepoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use sqlx::SqliteConnection;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use harbor_core::payment::{SplitTenderResult, Tender};
use harbor_core::pricing::{aggregate_quantities, compute_totals, ensure_available, PricedLine};
use harbor_core::tax::{ResolvedTax, TaxValidation};
use harbor_core::validation::{validate_line_count, validate_quantity, validate_reason, validate_tendered_amount};
use harbor_core::{
    Clock, IdentityContext, Money, MovementKind, OrderNumber, PaymentCalculator, PaymentKind, Sale, SaleLine,
    SaleStatus, SaleWithLines, SystemClock, TaxCalculator,
};
use harbor_db::{
    CatalogRepository, Database, InventoryRepository, MovementRequest, PaymentMethodRepository, SaleRepository,
    TaxRuleRepository,
};

use crate::audit::{self, AuditEvent, AuditSink, TracingAuditSink};
use crate::config::EngineConfig;
use crate::error::{inactive_method, ConfigError, EngineError, EngineResult};
use crate::locks::TenantLocks;
use crate::protocol::{ChangeResponse, CreateSaleOptions, CreateSaleRequest, SaleReceipt, SplitTenderRequest};

const RESOURCE: &str = "transaction";

#[derive(Clone)]
pub struct TransactionEngine {
    pub(crate) db: Database,
    pub(crate) locks: TenantLocks,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) config: Arc<EngineConfig>,
    tax: TaxCalculator,
    payment: PaymentCalculator,
}

impl TransactionEngine {
    /// Builds an engine on the system clock, auditing to `tracing`.
    pub fn new(db: Database, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(TransactionEngine {
            db,
            locks: TenantLocks::new(),
            clock: Arc::new(SystemClock),
            audit: Arc::new(TracingAuditSink),
            tax: config.tax_calculator()?,
            payment: config.payment_calculator(),
            config: Arc::new(config),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates and completes a sale in one database transaction.
    pub async fn create(&self, ctx: &IdentityContext, request: &CreateSaleRequest) -> EngineResult<SaleReceipt> {
        let result = self.create_gated(ctx, request).await;
        self.audit_outcome(ctx, "transaction.create", RESOURCE, None, &result, |receipt| {
            json!({
                "saleId": receipt.sale.sale.id,
                "orderNumber": receipt.sale.sale.order_number,
                "grandTotal": receipt.sale.sale.grand_total_cents,
                "lines": receipt.sale.lines.len(),
            })
        });
        result
    }

    async fn create_gated(&self, ctx: &IdentityContext, request: &CreateSaleRequest) -> EngineResult<SaleReceipt> {
        let _gate = self.locks.lock(&ctx.tenant_id).await;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let receipt = self.create_in(&mut tx, ctx, request, now).await?;
        tx.commit().await?;

        info!(
            tenant_id = %ctx.tenant_id,
            order_number = %receipt.sale.sale.order_number,
            grand_total = %receipt.sale.sale.grand_total(),
            "Sale completed"
        );
        Ok(receipt)
    }

    /// The create steps on a caller-owned transaction. The caller holds the
    /// tenant gate and decides whether to commit.
    pub(crate) async fn create_in(
        &self,
        conn: &mut SqliteConnection,
        ctx: &IdentityContext,
        request: &CreateSaleRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<SaleReceipt> {
        let tenant_id = ctx.tenant_id.as_str();
        let options = &request.options;
        validate_line_count(request.lines.len())?;
        validate_tendered_amount(request.tendered.cents())?;

        let method = PaymentMethodRepository::new(&mut *conn)
            .get(tenant_id, &request.payment_method_id)
            .await?
            .ok_or_else(|| {
                EngineError::InvalidPaymentMethod(format!(
                    "Payment method not found: {}",
                    request.payment_method_id
                ))
            })?;
        if !method.is_usable() {
            return Err(inactive_method(&method.name, method.kind));
        }

        let mut priced = Vec::with_capacity(request.lines.len());
        let mut tracked = HashSet::new();
        for input in &request.lines {
            validate_quantity(input.quantity)?;
            let item = CatalogRepository::new(&mut *conn)
                .get(tenant_id, &input.item_id)
                .await?
                .ok_or_else(|| EngineError::not_found("CatalogItem", &input.item_id))?;
            if item.tracks_inventory {
                tracked.insert(item.id.clone());
            }
            priced.push(PricedLine {
                unit_price: input.unit_price.unwrap_or_else(|| item.unit_price()),
                item_id: item.id,
                quantity: input.quantity,
            });
        }

        let tax = self.resolve_tax(&mut *conn, tenant_id, options).await?;
        let totals = compute_totals(&priced, options.discount, tax.as_ref().map(|t| t.rate))?;

        for (item_id, requested) in aggregate_quantities(&priced) {
            if !tracked.contains(&item_id) {
                continue;
            }
            let available = InventoryRepository::new(&mut *conn)
                .get_for_item(tenant_id, &item_id)
                .await?
                .map(|record| record.available_stock())
                .unwrap_or(0);
            ensure_available(&item_id, requested, available)?;
        }

        self.payment
            .validate_tender(method.kind, totals.grand_total, request.tendered, &options.method_options)?;
        let change = PaymentCalculator::compute_change(totals.grand_total, request.tendered)?;

        // Offline sales keep their device time, never later than the server's
        let created_at = options.created_at.map_or(now, |at| at.min(now));
        let mut sale = Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            order_number: String::new(),
            payment_method_id: method.id.clone(),
            tax_rule_id: tax.as_ref().and_then(|t| t.rule_id.clone()),
            tax_rate_bps: totals.tax_rate.bps(),
            sub_total_cents: totals.sub_total.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            grand_total_cents: totals.grand_total.cents(),
            paid_cents: 0,
            change_cents: 0,
            status: SaleStatus::Pending,
            notes: options.notes.clone(),
            void_reason: None,
            voided_at: None,
            refund_cents: None,
            refund_reason: None,
            refunded_at: None,
            created_by: ctx.actor_id.clone(),
            device_id: options.device_id.clone(),
            created_at,
            updated_at: now,
            completed_at: None,
            deleted_at: None,
        };
        self.insert_with_order_number(&mut *conn, &mut sale, options.order_number.as_deref(), now.date_naive())
            .await?;

        for (priced_line, line_tax) in priced.iter().zip(&totals.line_taxes) {
            let line = SaleLine {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                sale_id: sale.id.clone(),
                item_id: priced_line.item_id.clone(),
                quantity: priced_line.quantity,
                unit_price_cents: priced_line.unit_price.cents(),
                line_total_cents: priced_line.line_total().cents(),
                tax_cents: line_tax.cents(),
                refunded_at: None,
                created_at,
            };
            SaleRepository::new(&mut *conn).insert_line(&line).await?;

            if tracked.contains(&line.item_id) {
                InventoryRepository::new(&mut *conn)
                    .record_movement(&MovementRequest {
                        tenant_id: tenant_id.to_string(),
                        item_id: line.item_id.clone(),
                        kind: MovementKind::StockOut,
                        quantity: line.quantity,
                        line_item_id: Some(line.id.clone()),
                        note: format!("Sale - Order {}", sale.order_number),
                        created_by: ctx.actor_id.clone(),
                        at: now,
                    })
                    .await?;
            }
        }

        SaleRepository::new(&mut *conn)
            .mark_completed(tenant_id, &sale.id, request.tendered.cents(), change.cents(), now)
            .await?;

        let stored = SaleRepository::new(&mut *conn)
            .get_with_lines(tenant_id, &sale.id)
            .await?
            .ok_or_else(|| EngineError::system("create", format!("sale {} missing after insert", sale.id)))?;

        let change_breakdown = match method.kind {
            PaymentKind::Cash => self.payment.breakdown(change).ok(),
            _ => None,
        };

        Ok(SaleReceipt {
            sale: stored,
            change,
            change_breakdown,
        })
    }

    async fn resolve_tax(
        &self,
        conn: &mut SqliteConnection,
        tenant_id: &str,
        options: &CreateSaleOptions,
    ) -> EngineResult<Option<ResolvedTax>> {
        if let Some(rule_id) = &options.tax_rule_id {
            let rule = TaxRuleRepository::new(conn)
                .get(tenant_id, rule_id)
                .await?
                .ok_or_else(|| EngineError::not_found("TaxRule", rule_id))?;
            return Ok(Some(self.tax.resolve(Some(&rule), None)));
        }
        if options.apply_default_tax {
            let tenant_default = TaxRuleRepository::new(conn).default_rule(tenant_id).await?;
            return Ok(Some(self.tax.resolve(None, tenant_default.as_ref())));
        }
        Ok(None)
    }

    /// Inserts the sale header under a client-supplied order number, or
    /// allocates the next one for `date`, retrying on collision.
    async fn insert_with_order_number(
        &self,
        conn: &mut SqliteConnection,
        sale: &mut Sale,
        client_number: Option<&str>,
        date: NaiveDate,
    ) -> EngineResult<()> {
        if let Some(number) = client_number {
            let number = number.trim();
            if number.is_empty() {
                return Err(EngineError::Validation("order number is required".to_string()));
            }
            number
                .parse::<OrderNumber>()
                .map_err(|_| EngineError::Validation(format!("Invalid order number: {}", number)))?;
            sale.order_number = number.to_string();
            return SaleRepository::new(conn).insert(sale).await.map_err(|e| {
                if e.is_unique_violation_on("order_number") {
                    EngineError::Conflict(format!("Order number {} already exists", number))
                } else {
                    e.into()
                }
            });
        }

        let attempts = self.config.transactions.max_order_number_attempts;
        for attempt in 1..=attempts {
            let highest = SaleRepository::new(&mut *conn)
                .highest_sequence(&sale.tenant_id, date)
                .await?;
            let Some(next) = OrderNumber::next_after(date, highest) else {
                warn!(tenant_id = %sale.tenant_id, %date, "Order number sequence exhausted");
                return Err(EngineError::Allocation { attempts: attempt });
            };
            sale.order_number = next.to_string();

            match SaleRepository::new(&mut *conn).insert(sale).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unique_violation_on("order_number") => {
                    warn!(
                        tenant_id = %sale.tenant_id,
                        order_number = %sale.order_number,
                        attempt,
                        "Order number taken, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::Allocation { attempts })
    }

    // =========================================================================
    // Void & Refund
    // =========================================================================

    /// Voids a completed sale inside the void window and restores stock.
    pub async fn void(&self, ctx: &IdentityContext, sale_id: &str, reason: &str) -> EngineResult<SaleWithLines> {
        let result = self.void_gated(ctx, sale_id, reason).await;
        self.audit_outcome(ctx, "transaction.void", RESOURCE, Some(sale_id), &result, |sale| {
            json!({ "orderNumber": sale.sale.order_number, "reason": reason })
        });
        result
    }

    async fn void_gated(&self, ctx: &IdentityContext, sale_id: &str, reason: &str) -> EngineResult<SaleWithLines> {
        validate_reason(reason)?;
        let tenant_id = ctx.tenant_id.as_str();

        let _gate = self.locks.lock(tenant_id).await;
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let current = SaleRepository::new(&mut tx)
            .get_with_lines(tenant_id, sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))?;
        let sale = &current.sale;

        if sale.status != SaleStatus::Completed {
            return Err(EngineError::NotVoidable {
                sale_id: sale_id.to_string(),
                reason: format!("sale is {}", sale.status),
            });
        }
        if now - sale.created_at >= self.config.void_window() {
            return Err(EngineError::NotVoidable {
                sale_id: sale_id.to_string(),
                reason: "void window has passed".to_string(),
            });
        }

        let note = format!("Reverted from voided order {}", sale.order_number);
        self.restore_stock(&mut tx, ctx, &current.lines, &note, now).await?;
        SaleRepository::new(&mut tx)
            .mark_voided(tenant_id, sale_id, reason.trim(), now)
            .await?;

        let voided = SaleRepository::new(&mut tx)
            .get_with_lines(tenant_id, sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))?;
        tx.commit().await?;

        info!(tenant_id, order_number = %voided.sale.order_number, "Sale voided");
        Ok(voided)
    }

    /// Refunds some or all lines of a completed sale and restores their stock.
    ///
    /// The sale becomes `refunded` either way; `refund_cents` is the sum of
    /// line total plus line tax over the refunded lines.
    pub async fn refund(
        &self,
        ctx: &IdentityContext,
        sale_id: &str,
        line_ids: &[String],
        reason: &str,
    ) -> EngineResult<SaleWithLines> {
        let result = self.refund_gated(ctx, sale_id, line_ids, reason).await;
        self.audit_outcome(ctx, "transaction.refund", RESOURCE, Some(sale_id), &result, |sale| {
            json!({
                "orderNumber": sale.sale.order_number,
                "refundAmount": sale.sale.refund_cents,
                "lineIds": line_ids,
                "reason": reason,
            })
        });
        result
    }

    async fn refund_gated(
        &self,
        ctx: &IdentityContext,
        sale_id: &str,
        line_ids: &[String],
        reason: &str,
    ) -> EngineResult<SaleWithLines> {
        validate_reason(reason)?;
        let tenant_id = ctx.tenant_id.as_str();

        let _gate = self.locks.lock(tenant_id).await;
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let current = SaleRepository::new(&mut tx)
            .get_with_lines(tenant_id, sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))?;
        let sale = &current.sale;

        if sale.status != SaleStatus::Completed {
            return Err(EngineError::NotRefundable {
                sale_id: sale_id.to_string(),
                reason: format!("sale is {}", sale.status),
            });
        }
        if let Some(window) = self.config.refund_window() {
            if now - sale.created_at >= window {
                return Err(EngineError::NotRefundable {
                    sale_id: sale_id.to_string(),
                    reason: "refund window has passed".to_string(),
                });
            }
        }

        let selected: Vec<SaleLine> = if line_ids.is_empty() {
            current.lines.clone()
        } else {
            let mut selected = Vec::with_capacity(line_ids.len());
            for line_id in line_ids {
                let line = current
                    .lines
                    .iter()
                    .find(|l| &l.id == line_id)
                    .ok_or_else(|| EngineError::Validation(format!("Line {} is not part of sale {}", line_id, sale_id)))?;
                if !selected.iter().any(|s: &SaleLine| s.id == line.id) {
                    selected.push(line.clone());
                }
            }
            selected
        };

        let refund_amount: Money = selected.iter().map(SaleLine::refundable_amount).sum();
        let note = format!("Reverted from refunded order {}", sale.order_number);
        self.restore_stock(&mut tx, ctx, &selected, &note, now).await?;

        let selected_ids: Vec<String> = selected.iter().map(|l| l.id.clone()).collect();
        SaleRepository::new(&mut tx)
            .mark_lines_refunded(tenant_id, sale_id, &selected_ids, now)
            .await?;
        SaleRepository::new(&mut tx)
            .mark_refunded(tenant_id, sale_id, refund_amount.cents(), reason.trim(), now)
            .await?;

        let refunded = SaleRepository::new(&mut tx)
            .get_with_lines(tenant_id, sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))?;
        tx.commit().await?;

        info!(
            tenant_id,
            order_number = %refunded.sale.order_number,
            refund = %refund_amount,
            lines = selected_ids.len(),
            "Sale refunded"
        );
        Ok(refunded)
    }

    /// `stock_in` for every line whose item still has an inventory record.
    async fn restore_stock(
        &self,
        conn: &mut SqliteConnection,
        ctx: &IdentityContext,
        lines: &[SaleLine],
        note: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        for line in lines {
            let tracked = InventoryRepository::new(&mut *conn)
                .get_for_item(&ctx.tenant_id, &line.item_id)
                .await?
                .is_some();
            if !tracked {
                continue;
            }
            InventoryRepository::new(&mut *conn)
                .record_movement(&MovementRequest {
                    tenant_id: ctx.tenant_id.clone(),
                    item_id: line.item_id.clone(),
                    kind: MovementKind::StockIn,
                    quantity: line.quantity,
                    line_item_id: Some(line.id.clone()),
                    note: note.to_string(),
                    created_by: ctx.actor_id.clone(),
                    at: now,
                })
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get(&self, ctx: &IdentityContext, sale_id: &str) -> EngineResult<SaleWithLines> {
        let mut conn = self.db.acquire().await?;
        SaleRepository::new(&mut conn)
            .get_with_lines(&ctx.tenant_id, sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))
    }

    pub async fn find_by_order_number(&self, ctx: &IdentityContext, order_number: &str) -> EngineResult<SaleWithLines> {
        let mut conn = self.db.acquire().await?;
        let sale = SaleRepository::new(&mut conn)
            .find_by_order_number(&ctx.tenant_id, order_number)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", order_number))?;
        let lines = SaleRepository::new(&mut conn).lines(&ctx.tenant_id, &sale.id).await?;
        Ok(SaleWithLines { sale, lines })
    }

    /// Recomputes a stored sale's tax and compares it with the stored amount.
    pub async fn validate_tax(&self, ctx: &IdentityContext, sale_id: &str) -> EngineResult<TaxValidation> {
        let stored = self.get(ctx, sale_id).await?;
        Ok(TaxCalculator::validate(
            &stored.sale,
            &stored.lines,
            self.config.tax_tolerance(),
        ))
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Change for a cash tender, with its denomination breakdown when the
    /// amount can be expressed in notes and coins.
    pub fn compute_change(&self, due: Money, tendered: Money) -> EngineResult<ChangeResponse> {
        let change = PaymentCalculator::compute_change(due, tendered)?;
        Ok(ChangeResponse {
            change,
            breakdown: self.payment.breakdown(change).ok(),
        })
    }

    /// Validates a split payment whose legs name tenant payment methods.
    pub async fn split_tender(&self, ctx: &IdentityContext, request: &SplitTenderRequest) -> EngineResult<SplitTenderResult> {
        if request.tenders.is_empty() {
            return Err(EngineError::Validation("tenders is required".to_string()));
        }

        let mut tenders = Vec::with_capacity(request.tenders.len());
        {
            let mut conn = self.db.acquire().await?;
            for input in &request.tenders {
                let method = PaymentMethodRepository::new(&mut conn)
                    .get(&ctx.tenant_id, &input.payment_method_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::InvalidPaymentMethod(format!(
                            "Payment method not found: {}",
                            input.payment_method_id
                        ))
                    })?;
                if !method.is_usable() {
                    return Err(inactive_method(&method.name, method.kind));
                }
                tenders.push(Tender {
                    kind: method.kind,
                    amount: input.amount,
                    options: input.options.clone(),
                });
            }
        }

        Ok(self.payment.split_tender(request.due, &tenders)?)
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Emits one audit event for an operation result.
    pub(crate) fn audit_outcome<T>(
        &self,
        ctx: &IdentityContext,
        action: &str,
        resource_type: &str,
        resource_id: Option<&str>,
        result: &EngineResult<T>,
        details: impl FnOnce(&T) -> Value,
    ) {
        let (success, details, resource_id) = match result {
            Ok(value) => {
                let details = details(value);
                let id = resource_id
                    .map(str::to_string)
                    .or_else(|| details.get("saleId").and_then(Value::as_str).map(str::to_string));
                (true, details, id)
            }
            Err(e) => (
                false,
                json!({ "error": e.to_string(), "code": e.code() }),
                resource_id.map(str::to_string),
            ),
        };
        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(ctx, action, resource_type, resource_id, details, success, self.clock.now()),
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::error::ErrorCode;
    use crate::test_support::{ctx, fixture, fixture_with, line, sale, ACTOR, TENANT};
    use chrono::Duration;
    use harbor_core::payment::DenominationCount;
    use harbor_core::TenderOptions;
    use harbor_db::SaleFilter;

    async fn sale_count(engine: &TransactionEngine) -> usize {
        let mut conn = engine.db().acquire().await.unwrap();
        SaleRepository::new(&mut conn)
            .list(TENANT, &SaleFilter { limit: 100, ..SaleFilter::default() })
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_create_cash_sale_with_change() {
        let fx = fixture().await;
        let request = sale(vec![line(&fx.kopi, 2), line(&fx.roti, 1)], &fx.cash, 30_000);

        let receipt = fx.engine.create(&ctx(), &request).await.unwrap();
        let stored = &receipt.sale.sale;

        assert_eq!(stored.status, SaleStatus::Completed);
        assert_eq!(stored.order_number, "20240315-0001");
        assert_eq!(stored.sub_total(), Money::from_major(25_000));
        assert_eq!(stored.grand_total(), Money::from_major(25_000));
        assert_eq!(stored.paid(), Money::from_major(30_000));
        assert_eq!(receipt.change, Money::from_major(5_000));
        assert_eq!(
            receipt.change_breakdown,
            Some(vec![DenominationCount {
                denomination: Money::from_major(5_000),
                count: 1
            }])
        );
        assert_eq!(receipt.sale.lines.len(), 2);
        assert_eq!(fx.stock(&fx.kopi).await, 8);
        assert_eq!(fx.stock(&fx.roti).await, 4);
        assert_eq!(fx.audit.actions(), vec!["transaction.create"]);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let fx = fixture().await;
        let request = sale(vec![line(&fx.roti, 4), line(&fx.roti, 2)], &fx.cash, 50_000);

        let err = fx.engine.create(&ctx(), &request).await.unwrap_err();
        match err {
            EngineError::InsufficientStock {
                requested, available, ..
            } => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fx.stock(&fx.roti).await, 5);
        assert_eq!(sale_count(&fx.engine).await, 0);

        let events = fx.audit.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert_eq!(events[0].details["code"], "INSUFFICIENT_STOCK");
    }

    #[tokio::test]
    async fn test_exclusive_tax_on_sale() {
        let fx = fixture().await;
        let mut request = sale(vec![line(&fx.paket, 1)], &fx.card, 111_000);
        request.options.tax_rule_id = Some(fx.ppn.clone());

        let receipt = fx.engine.create(&ctx(), &request).await.unwrap();
        let stored = &receipt.sale.sale;
        assert_eq!(stored.tax(), Money::from_major(11_000));
        assert_eq!(stored.grand_total(), Money::from_major(111_000));
        assert_eq!(stored.tax_rate_bps, 1100);
        assert_eq!(stored.tax_rule_id.as_deref(), Some(fx.ppn.as_str()));
        assert_eq!(receipt.sale.lines[0].tax(), Money::from_major(11_000));
        assert_eq!(receipt.change, Money::zero());
        assert!(receipt.change_breakdown.is_none());

        let check = fx.engine.validate_tax(&ctx(), &stored.id).await.unwrap();
        assert!(check.valid);
        assert_eq!(check.calculated, Money::from_major(11_000));
    }

    #[tokio::test]
    async fn test_default_tax_after_discount() {
        let fx = fixture().await;
        let mut request = sale(vec![line(&fx.kopi, 3)], &fx.cash, 50_000);
        request.options.apply_default_tax = true;
        request.options.discount = Money::from_major(10_000);

        let receipt = fx.engine.create(&ctx(), &request).await.unwrap();
        let stored = &receipt.sale.sale;
        assert_eq!(stored.sub_total(), Money::from_major(30_000));
        assert_eq!(stored.tax(), Money::from_major(2_200));
        assert_eq!(stored.grand_total(), Money::from_major(22_200));
        assert_eq!(receipt.change, Money::from_major(27_800));
    }

    #[tokio::test]
    async fn test_insufficient_payment_reports_shortfall() {
        let fx = fixture().await;
        let request = sale(vec![line(&fx.kopi, 2), line(&fx.roti, 1)], &fx.cash, 20_000);

        let err = fx.engine.create(&ctx(), &request).await.unwrap_err();
        match err {
            EngineError::InsufficientPayment { shortfall, .. } => assert_eq!(shortfall, Money::from_major(5_000)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fx.stock(&fx.kopi).await, 10);
    }

    #[tokio::test]
    async fn test_card_and_digital_tender_rules() {
        let fx = fixture().await;

        let overpaid = sale(vec![line(&fx.kopi, 1)], &fx.card, 12_000);
        let err = fx.engine.create(&ctx(), &overpaid).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let no_reference = sale(vec![line(&fx.kopi, 1)], &fx.qris, 10_000);
        let err = fx.engine.create(&ctx(), &no_reference).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let mut with_reference = sale(vec![line(&fx.kopi, 1)], &fx.qris, 10_000);
        with_reference.options.method_options = TenderOptions {
            reference: Some("QR-8812".into()),
            ..TenderOptions::default()
        };
        fx.engine.create(&ctx(), &with_reference).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_payment_method() {
        let fx = fixture().await;
        let request = sale(vec![line(&fx.kopi, 1)], "missing", 10_000);
        let err = fx.engine.create(&ctx(), &request).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidPaymentMethod(_)));

        {
            let mut conn = fx.engine.db().acquire().await.unwrap();
            PaymentMethodRepository::new(&mut conn)
                .update(TENANT, &fx.cash, "Tunai", PaymentKind::Cash, false, fx.clock.now())
                .await
                .unwrap();
        }
        let request = sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000);
        let err = fx.engine.create(&ctx(), &request).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidPaymentMethod(_)));
    }

    #[tokio::test]
    async fn test_order_numbers_are_sequential_per_day() {
        let fx = fixture().await;
        let request = sale(vec![line(&fx.paket, 1)], &fx.cash, 100_000);

        let first = fx.engine.create(&ctx(), &request).await.unwrap();
        let second = fx.engine.create(&ctx(), &request).await.unwrap();
        fx.clock.advance(Duration::days(1));
        let next_day = fx.engine.create(&ctx(), &request).await.unwrap();

        assert_eq!(first.sale.sale.order_number, "20240315-0001");
        assert_eq!(second.sale.sale.order_number, "20240315-0002");
        assert_eq!(next_day.sale.sale.order_number, "20240316-0001");
    }

    #[tokio::test]
    async fn test_client_order_number_collision_is_conflict() {
        let fx = fixture().await;
        let mut request = sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000);
        request.options.order_number = Some("20240314-0042".into());
        request.options.created_at = Some(fx.clock.now() - Duration::hours(20));

        let stored = fx.engine.create(&ctx(), &request).await.unwrap();
        assert_eq!(stored.sale.sale.created_at, fx.clock.now() - Duration::hours(20));

        let err = fx.engine.create(&ctx(), &request).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(fx.stock(&fx.kopi).await, 9);
    }

    #[tokio::test]
    async fn test_client_order_number_must_be_well_formed() {
        let fx = fixture().await;
        let mut request = sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000);
        for bad in ["20240315-99999999999", "20240315-1", "offline-7"] {
            request.options.order_number = Some(bad.into());
            let err = fx.engine.create(&ctx(), &request).await.unwrap_err();
            assert!(matches!(err, EngineError::Validation(ref m) if m.contains("Invalid order number")));
        }
        assert_eq!(fx.stock(&fx.kopi).await, 10);

        let online = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();
        assert_eq!(online.sale.sale.order_number, "20240315-0001");
    }

    #[tokio::test]
    async fn test_oversized_unit_price_is_rejected() {
        let fx = fixture().await;
        let mut priced = line(&fx.paket, 3);
        priced.unit_price = Some(Money::from_cents(i64::MAX / 2));
        let request = sale(vec![priced], &fx.cash, 100_000);

        let err = fx.engine.create(&ctx(), &request).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("unit price")));
        assert_eq!(sale_count(&fx.engine).await, 0);
    }

    #[tokio::test]
    async fn test_exhausted_sequence_fails_allocation() {
        let fx = fixture().await;
        let mut request = sale(vec![line(&fx.paket, 1)], &fx.cash, 100_000);
        request.options.order_number = Some("20240315-4294967295".into());
        fx.engine.create(&ctx(), &request).await.unwrap();

        let err = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.paket, 1)], &fx.cash, 100_000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Allocation { .. }));
        assert_eq!(err.code(), ErrorCode::AllocationFailed);

        // Other days are unaffected
        fx.clock.advance(Duration::days(1));
        let next_day = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.paket, 1)], &fx.cash, 100_000))
            .await
            .unwrap();
        assert_eq!(next_day.sale.sale.order_number, "20240316-0001");
    }

    #[tokio::test]
    async fn test_void_restores_stock() {
        let fx = fixture().await;
        let request = sale(vec![line(&fx.kopi, 3), line(&fx.paket, 1)], &fx.cash, 200_000);
        let receipt = fx.engine.create(&ctx(), &request).await.unwrap();
        assert_eq!(fx.stock(&fx.kopi).await, 7);

        fx.clock.advance(Duration::hours(2));
        let voided = fx
            .engine
            .void(&ctx(), &receipt.sale.sale.id, "Pelanggan batal")
            .await
            .unwrap();

        assert_eq!(voided.sale.status, SaleStatus::Voided);
        assert_eq!(voided.sale.void_reason.as_deref(), Some("Pelanggan batal"));
        assert_eq!(fx.stock(&fx.kopi).await, 10);

        let mut conn = fx.engine.db().acquire().await.unwrap();
        let check = InventoryRepository::new(&mut conn).reconcile(TENANT, &fx.kopi).await.unwrap();
        assert!(check.consistent);
        let ledger = InventoryRepository::new(&mut conn)
            .ledger_for_item(TENANT, &fx.kopi)
            .await
            .unwrap();
        assert!(ledger
            .iter()
            .any(|e| e.note == format!("Reverted from voided order {}", voided.sale.order_number)));
    }

    #[tokio::test]
    async fn test_void_after_window_is_rejected() {
        let fx = fixture().await;
        let receipt = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();

        fx.clock.advance(Duration::hours(25));
        let err = fx.engine.void(&ctx(), &receipt.sale.sale.id, "late").await.unwrap_err();
        assert!(matches!(err, EngineError::NotVoidable { .. }));
        assert_eq!(fx.stock(&fx.kopi).await, 9);
    }

    #[tokio::test]
    async fn test_void_twice_is_rejected() {
        let fx = fixture().await;
        let receipt = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();
        let id = receipt.sale.sale.id.clone();

        fx.engine.void(&ctx(), &id, "salah input").await.unwrap();
        let err = fx.engine.void(&ctx(), &id, "salah input").await.unwrap_err();
        assert!(matches!(err, EngineError::NotVoidable { .. }));
        assert_eq!(fx.stock(&fx.kopi).await, 10);

        let err = fx.engine.refund(&ctx(), &id, &[], "refund").await.unwrap_err();
        assert!(matches!(err, EngineError::NotRefundable { .. }));
    }

    #[tokio::test]
    async fn test_partial_refund() {
        let fx = fixture().await;
        let mut request = sale(vec![line(&fx.kopi, 2), line(&fx.roti, 1)], &fx.cash, 30_000);
        request.options.tax_rule_id = Some(fx.ppn.clone());
        let receipt = fx.engine.create(&ctx(), &request).await.unwrap();
        let kopi_line = receipt
            .sale
            .lines
            .iter()
            .find(|l| l.item_id == fx.kopi)
            .unwrap()
            .clone();

        fx.clock.advance(Duration::days(3));
        let refunded = fx
            .engine
            .refund(&ctx(), &receipt.sale.sale.id, &[kopi_line.id.clone()], "Rusak")
            .await
            .unwrap();

        assert_eq!(refunded.sale.status, SaleStatus::Refunded);
        // 20.000 line + 2.200 line tax
        assert_eq!(refunded.sale.refund_cents, Some(Money::from_major(22_200).cents()));
        assert_eq!(fx.stock(&fx.kopi).await, 10);
        assert_eq!(fx.stock(&fx.roti).await, 4);
        let stored_line = refunded.lines.iter().find(|l| l.id == kopi_line.id).unwrap();
        assert!(stored_line.refunded_at.is_some());
    }

    #[tokio::test]
    async fn test_refund_window_when_configured() {
        let mut config = EngineConfig::default();
        config.transactions.refund_window_secs = Some(60 * 60);
        let fx = fixture_with(config).await;
        let receipt = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();

        fx.clock.advance(Duration::hours(2));
        let err = fx
            .engine
            .refund(&ctx(), &receipt.sale.sale.id, &[], "terlambat")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotRefundable { .. }));
    }

    #[tokio::test]
    async fn test_refund_unknown_line() {
        let fx = fixture().await;
        let receipt = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();
        let err = fx
            .engine
            .refund(&ctx(), &receipt.sale.sale.id, &["nope".to_string()], "x")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(fx.stock(&fx.kopi).await, 9);
    }

    #[tokio::test]
    async fn test_lookups_are_tenant_scoped() {
        let fx = fixture().await;
        let receipt = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();
        let id = &receipt.sale.sale.id;

        let found = fx.engine.find_by_order_number(&ctx(), "20240315-0001").await.unwrap();
        assert_eq!(&found.sale.id, id);

        let other = IdentityContext::new("toko-2", ACTOR);
        let err = fx.engine.get(&other, id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let fx = fixture().await;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = fx.engine.clone();
            let request = sale(vec![line(&fx.roti, 1)], &fx.cash, 5_000);
            handles.push(tokio::spawn(async move { engine.create(&ctx(), &request).await }));
        }

        let mut numbers = HashSet::new();
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(receipt) => {
                    numbers.insert(receipt.sale.sale.order_number);
                }
                Err(EngineError::InsufficientStock { .. }) => rejected += 1,
                Err(other) => panic!("unexpected {other:?}"),
            }
        }

        assert_eq!(numbers.len(), 5);
        assert_eq!(rejected, 3);
        assert_eq!(fx.stock(&fx.roti).await, 0);
    }

    #[tokio::test]
    async fn test_failing_audit_sink_does_not_fail_sale() {
        let fx = fixture().await;
        let engine = fx.engine.clone().with_audit_sink(Arc::new(MemoryAuditSink::failing()));
        let receipt = engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();
        assert_eq!(receipt.sale.sale.status, SaleStatus::Completed);
    }

    #[tokio::test]
    async fn test_change_and_split_tender() {
        let fx = fixture().await;
        let change = fx
            .engine
            .compute_change(Money::from_major(27_000), Money::from_major(100_000))
            .unwrap();
        assert_eq!(change.change, Money::from_major(73_000));
        let notes: Vec<i64> = change.breakdown.unwrap().iter().map(|d| d.denomination.major()).collect();
        assert_eq!(notes, vec![50_000, 20_000, 2_000, 1_000]);

        let request = SplitTenderRequest {
            due: Money::from_major(100_000),
            tenders: vec![
                crate::protocol::TenderInput {
                    payment_method_id: fx.card.clone(),
                    amount: Money::from_major(60_000),
                    options: TenderOptions::default(),
                },
                crate::protocol::TenderInput {
                    payment_method_id: fx.cash.clone(),
                    amount: Money::from_major(50_000),
                    options: TenderOptions::default(),
                },
            ],
        };
        let split = fx.engine.split_tender(&ctx(), &request).await.unwrap();
        assert_eq!(split.total_tendered, Money::from_major(110_000));
        assert_eq!(split.change, Money::from_major(10_000));
    }
}
