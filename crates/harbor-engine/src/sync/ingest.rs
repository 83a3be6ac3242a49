//! # Bulk Ingestion
//!
//! Offline sales queued on a POS, replayed against the server.
//!
//! ## Batch Flow
//! ```text
//! bulk_ingest(batch)
//!   │
//!   ├─► empty? ── ValidationError        too big? ── PayloadTooLarge
//!   │
//!   ├─► tenant gate ──► BEGIN
//!   │
//!   │   for each entry:
//!   │     SAVEPOINT
//!   │       structural checks ───────────────── fail ──► ROLLBACK TO, count failed
//!   │       order number already stored?
//!   │         ├─ server_wins ──► keep stored sale, count synced
//!   │         └─ other       ──► pending conflict, count conflict
//!   │       else create sale (client number, client created_at)
//!   │     RELEASE
//!   │
//!   ├─► failed / total > threshold ──► ROLLBACK ──► BatchAborted(report)
//!   │
//!   └─► touch last_sync ──► COMMIT ──► report
//! ```

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqliteConnection;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use harbor_core::{
    Capability, ConflictStatus, ConflictStrategy, IdentityContext, Money, OrderNumber, SyncConflict,
};
use harbor_db::{CatalogRepository, PaymentMethodRepository, SaleRepository, SyncRepository};

use super::{require, SyncEngine, RESOURCE};
use crate::error::{EngineError, EngineResult};
use crate::protocol::{
    BulkIngestRequest, CreateSaleOptions, CreateSaleRequest, EntryValidation, IngestError, IngestOutcome,
    IngestReport, IngestStatus, IngestTransaction, SaleLineInput, ValidateRequest, ValidationReport,
};

const SERVER_KEPT_NOTE: &str = "Server version preserved";

impl SyncEngine {
    /// Stores a batch of offline sales. See the module docs for the flow.
    pub async fn bulk_ingest(&self, ctx: &IdentityContext, request: &BulkIngestRequest) -> EngineResult<IngestReport> {
        let result = self.bulk_ingest_inner(ctx, request).await;
        self.engine.audit_outcome(ctx, "sync.bulk_ingest", RESOURCE, None, &result, |report| {
            json!({
                "totalTransactions": report.total_transactions,
                "successfulSyncs": report.successful_syncs,
                "failedSyncs": report.failed_syncs,
                "conflicts": report.conflicts,
                "deviceId": request.device_id,
            })
        });
        result
    }

    async fn bulk_ingest_inner(&self, ctx: &IdentityContext, request: &BulkIngestRequest) -> EngineResult<IngestReport> {
        require(ctx, &[Capability::SyncTransactions])?;
        let total = request.transactions.len();
        if total == 0 {
            return Err(EngineError::Validation("transactions is required".to_string()));
        }
        let settings = &self.config().sync;
        if total > settings.max_batch_size {
            return Err(EngineError::PayloadTooLarge {
                size: total,
                max: settings.max_batch_size,
            });
        }
        let strategy = request.conflict_strategy.unwrap_or(settings.default_conflict_strategy);
        let started = Instant::now();

        let _gate = self.engine.locks.lock(&ctx.tenant_id).await;
        let now = self.engine.now();
        let mut tx = self.engine.db.begin().await?;

        let mut report = IngestReport {
            total_transactions: total,
            ..IngestReport::default()
        };

        for (index, entry) in request.transactions.iter().enumerate() {
            let mut savepoint = sqlx::Connection::begin(&mut *tx).await?;
            let outcome = self
                .ingest_entry(&mut savepoint, ctx, index, entry, strategy, request.device_id.as_deref(), now)
                .await;

            match outcome {
                Ok(outcome) => {
                    savepoint.commit().await?;
                    match outcome.status {
                        IngestStatus::Created | IngestStatus::ServerKept => report.successful_syncs += 1,
                        IngestStatus::Unresolved => report.conflicts += 1,
                        IngestStatus::Failed => report.failed_syncs += 1,
                    }
                    report.outcomes.push(outcome);
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    debug!(index, error = %e, "Offline entry rejected");
                    report.failed_syncs += 1;
                    report.errors.push(IngestError {
                        index,
                        transaction_id: entry.transaction_id.clone(),
                        order_number: entry.order_number.clone(),
                        error: e.to_string(),
                    });
                    report.outcomes.push(IngestOutcome {
                        index,
                        transaction_id: entry.transaction_id.clone(),
                        order_number: entry.order_number.clone(),
                        status: IngestStatus::Failed,
                        sale_id: None,
                        conflict_id: None,
                        note: Some(e.to_string()),
                    });
                }
            }
        }
        report.processing_time_seconds = started.elapsed().as_secs_f64();

        let failure_ratio = report.failed_syncs as f64 / total as f64;
        if failure_ratio > settings.failure_ratio_threshold {
            tx.rollback().await?;
            warn!(
                tenant_id = %ctx.tenant_id,
                failed = report.failed_syncs,
                total,
                "Offline batch rolled back"
            );
            return Err(EngineError::BatchAborted(Box::new(report)));
        }

        SyncRepository::new(&mut tx)
            .touch_last_sync(&ctx.tenant_id, &ctx.actor_id, now)
            .await?;
        tx.commit().await?;

        info!(
            tenant_id = %ctx.tenant_id,
            device_id = ?request.device_id,
            total,
            synced = report.successful_syncs,
            failed = report.failed_syncs,
            conflicts = report.conflicts,
            "Offline batch ingested"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn ingest_entry(
        &self,
        conn: &mut SqliteConnection,
        ctx: &IdentityContext,
        index: usize,
        entry: &IngestTransaction,
        strategy: ConflictStrategy,
        device_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<IngestOutcome> {
        let check = check_entry(&mut *conn, &ctx.tenant_id, entry).await?;
        let payment_method_id = check.into_payment_method()?;
        let order_number = entry.order_number.as_deref().unwrap_or_default().trim().to_string();

        let outcome = |status, sale_id, conflict_id, note: Option<&str>| IngestOutcome {
            index,
            transaction_id: entry.transaction_id.clone(),
            order_number: Some(order_number.clone()),
            status,
            sale_id,
            conflict_id,
            note: note.map(str::to_string),
        };

        let existing = SaleRepository::new(&mut *conn)
            .find_by_order_number(&ctx.tenant_id, &order_number)
            .await?;

        if let Some(existing) = existing {
            if strategy == ConflictStrategy::ServerWins {
                debug!(order_number = %order_number, "Duplicate offline sale, keeping stored copy");
                return Ok(outcome(
                    IngestStatus::ServerKept,
                    Some(existing.id),
                    None,
                    Some(SERVER_KEPT_NOTE),
                ));
            }

            let conflict = SyncConflict {
                id: Uuid::new_v4().to_string(),
                tenant_id: ctx.tenant_id.clone(),
                order_number: order_number.clone(),
                existing_sale_id: existing.id.clone(),
                strategy,
                client_payload: serde_json::to_string(entry)?,
                status: ConflictStatus::Pending,
                resolution: None,
                resolved_sale_id: None,
                resolved_by: None,
                device_id: device_id.map(str::to_string),
                created_by: ctx.actor_id.clone(),
                created_at: now,
                resolved_at: None,
            };
            SyncRepository::new(&mut *conn).insert_conflict(&conflict).await?;
            info!(
                tenant_id = %ctx.tenant_id,
                order_number = %order_number,
                strategy = strategy.as_str(),
                "Offline sale recorded as conflict"
            );
            let note = match strategy {
                ConflictStrategy::Manual => "Recorded for manual resolution",
                _ => "Stored sale kept unchanged; recorded for review",
            };
            return Ok(outcome(
                IngestStatus::Unresolved,
                Some(existing.id),
                Some(conflict.id),
                Some(note),
            ));
        }

        let request = sale_request(entry, payment_method_id, Some(order_number.clone()), device_id);
        let receipt = self.engine.create_in(&mut *conn, ctx, &request, now).await?;
        Ok(outcome(IngestStatus::Created, Some(receipt.sale.sale.id), None, None))
    }

    /// Runs the structural checks of bulk ingestion without writing.
    pub async fn validate_only(&self, ctx: &IdentityContext, request: &ValidateRequest) -> EngineResult<ValidationReport> {
        require(ctx, &[Capability::SyncTransactions])?;
        let total = request.transactions.len();
        let max = self.config().sync.max_batch_size;
        if total > max {
            return Err(EngineError::PayloadTooLarge { size: total, max });
        }

        let mut conn = self.engine.db.acquire().await?;
        let mut errors = Vec::new();
        for (index, entry) in request.transactions.iter().enumerate() {
            let check = check_entry(&mut conn, &ctx.tenant_id, entry).await?;
            if !check.errors.is_empty() {
                errors.push(EntryValidation {
                    index,
                    transaction_id: entry.transaction_id.clone(),
                    order_number: entry.order_number.clone(),
                    errors: check.errors,
                });
            }
        }

        let invalid_count = errors.len();
        Ok(ValidationReport {
            valid: invalid_count == 0,
            valid_count: total - invalid_count,
            invalid_count,
            errors,
            estimated_processing_seconds: estimated_processing_seconds(total),
        })
    }
}

// =============================================================================
// Entry Checks
// =============================================================================

pub(super) struct EntryCheck {
    pub errors: Vec<String>,
    pub payment_method_id: Option<String>,
}

impl EntryCheck {
    /// The resolved payment method, or every problem found as one
    /// validation error.
    pub fn into_payment_method(self) -> EngineResult<String> {
        match self.payment_method_id {
            Some(id) if self.errors.is_empty() => Ok(id),
            _ => Err(EngineError::Validation(self.errors.join("; "))),
        }
    }
}

/// Required fields present, order number well formed, items and payment
/// method (by id or name) resolvable in the tenant, quantities positive.
pub(super) async fn check_entry(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    entry: &IngestTransaction,
) -> EngineResult<EntryCheck> {
    let mut errors = Vec::new();

    match entry.order_number.as_deref().map(str::trim) {
        None | Some("") => errors.push("Missing order number".to_string()),
        Some(number) => {
            if number.parse::<OrderNumber>().is_err() {
                errors.push(format!("Invalid order number: {}", number));
            }
        }
    }

    match entry.items.as_deref() {
        None | Some([]) => errors.push("Missing items".to_string()),
        Some(items) => {
            for item in items {
                if item.quantity <= 0 {
                    errors.push(format!("Invalid quantity for item: {}", item.item_id));
                }
                let found = CatalogRepository::new(&mut *conn)
                    .get(tenant_id, &item.item_id)
                    .await?
                    .is_some();
                if !found {
                    errors.push(format!("Item not found: {}", item.item_id));
                }
            }
        }
    }

    if entry.paid_amount.is_none() {
        errors.push("Missing payment amount".to_string());
    }

    let mut payment_method_id = None;
    match entry.payment_method.as_deref().map(str::trim) {
        None | Some("") => errors.push("Missing payment method".to_string()),
        Some(reference) => {
            match PaymentMethodRepository::new(&mut *conn).resolve(tenant_id, reference).await? {
                Some(method) => payment_method_id = Some(method.id),
                None => errors.push(format!("Payment method not found: {}", reference)),
            }
        }
    }

    Ok(EntryCheck {
        errors,
        payment_method_id,
    })
}

/// The sale an offline entry describes.
pub(super) fn sale_request(
    entry: &IngestTransaction,
    payment_method_id: String,
    order_number: Option<String>,
    device_id: Option<&str>,
) -> CreateSaleRequest {
    let lines = entry
        .items
        .iter()
        .flatten()
        .map(|item| SaleLineInput {
            item_id: item.item_id.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect();

    CreateSaleRequest {
        lines,
        payment_method_id,
        tendered: entry.paid_amount.unwrap_or(Money::zero()),
        options: CreateSaleOptions {
            discount: entry.discount.unwrap_or(Money::zero()),
            tax_rule_id: entry.tax_rule_id.clone(),
            apply_default_tax: entry.apply_default_tax,
            notes: entry.notes.clone(),
            method_options: entry.method_options.clone(),
            order_number,
            created_at: entry.created_at,
            device_id: device_id.map(str::to_string),
        },
    }
}

/// `n × 0.1 s + min(n × 0.05 s, 2 s)`, to two decimals.
fn estimated_processing_seconds(entries: usize) -> f64 {
    let n = entries as f64;
    let estimate = n * 0.1 + (n * 0.05).min(2.0);
    (estimate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::protocol::IngestItem;
    use crate::test_support::{ctx, fixture, fixture_with, line, sale, ACTOR, TENANT};
    use chrono::Duration;
    use harbor_core::{Clock, SaleStatus};
    use harbor_db::SaleFilter;

    fn entry(order_number: &str, item_id: &str, quantity: i64, paid_major: i64) -> IngestTransaction {
        IngestTransaction {
            transaction_id: Some(format!("local-{order_number}")),
            order_number: Some(order_number.to_string()),
            items: Some(vec![IngestItem {
                item_id: item_id.to_string(),
                quantity,
                unit_price: None,
            }]),
            payment_method: Some("Tunai".to_string()),
            paid_amount: Some(Money::from_major(paid_major)),
            ..IngestTransaction::default()
        }
    }

    fn batch(transactions: Vec<IngestTransaction>) -> BulkIngestRequest {
        BulkIngestRequest {
            transactions,
            device_id: Some("pos-02".to_string()),
            ..BulkIngestRequest::default()
        }
    }

    async fn stored_sales(sync: &SyncEngine) -> usize {
        let mut conn = sync.engine().db().acquire().await.unwrap();
        SaleRepository::new(&mut conn)
            .list(TENANT, &SaleFilter { limit: 100, ..SaleFilter::default() })
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_duplicate_entry_stores_one_sale() {
        let fx = fixture().await;
        let sync = SyncEngine::new(fx.engine.clone());
        let request = batch(vec![
            entry("20240314-0007", &fx.kopi, 1, 10_000),
            entry("20240314-0007", &fx.kopi, 1, 10_000),
        ]);

        let report = sync.bulk_ingest(&ctx(), &request).await.unwrap();
        assert_eq!(report.total_transactions, 2);
        assert_eq!(report.successful_syncs, 2);
        assert_eq!(report.failed_syncs, 0);
        assert_eq!(report.outcomes[0].status, IngestStatus::Created);
        assert_eq!(report.outcomes[1].status, IngestStatus::ServerKept);
        assert_eq!(report.outcomes[1].note.as_deref(), Some(SERVER_KEPT_NOTE));
        assert_eq!(report.outcomes[1].sale_id, report.outcomes[0].sale_id);

        assert_eq!(stored_sales(&sync).await, 1);
        assert_eq!(fx.stock(&fx.kopi).await, 9);
    }

    #[tokio::test]
    async fn test_offline_sale_keeps_client_number_and_time() {
        let fx = fixture().await;
        let sync = SyncEngine::new(fx.engine.clone());
        let sold_at = fx.clock.now() - Duration::hours(3);
        let mut offline = entry("20240315-0050", &fx.roti, 2, 10_000);
        offline.created_at = Some(sold_at);
        offline.payment_method = Some(fx.cash.clone());

        let report = sync.bulk_ingest(&ctx(), &batch(vec![offline])).await.unwrap();
        let sale_id = report.outcomes[0].sale_id.clone().unwrap();

        let stored = fx.engine.get(&ctx(), &sale_id).await.unwrap();
        assert_eq!(stored.sale.order_number, "20240315-0050");
        assert_eq!(stored.sale.created_at, sold_at);
        assert_eq!(stored.sale.status, SaleStatus::Completed);
        assert_eq!(stored.sale.device_id.as_deref(), Some("pos-02"));

        // Server allocation continues past the client's number
        let next = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.paket, 1)], &fx.cash, 100_000))
            .await
            .unwrap();
        assert_eq!(next.sale.sale.order_number, "20240315-0051");
    }

    #[tokio::test]
    async fn test_majority_failure_rolls_back_batch() {
        let fx = fixture().await;
        let sync = SyncEngine::new(fx.engine.clone());
        let mut missing_method = entry("20240315-0102", &fx.kopi, 1, 10_000);
        missing_method.payment_method = None;
        let request = batch(vec![
            entry("20240315-0101", &fx.kopi, 1, 10_000),
            missing_method,
            entry("20240315-0103", "no-such-item", 1, 10_000),
        ]);

        let err = sync.bulk_ingest(&ctx(), &request).await.unwrap_err();
        let EngineError::BatchAborted(report) = err else {
            panic!("expected BatchAborted");
        };
        assert_eq!(report.failed_syncs, 2);
        assert_eq!(report.successful_syncs, 1);
        assert_eq!(report.errors[0].index, 1);
        assert!(report.errors[0].error.contains("Missing payment method"));
        assert!(report.errors[1].error.contains("Item not found: no-such-item"));

        assert_eq!(stored_sales(&sync).await, 0);
        assert_eq!(fx.stock(&fx.kopi).await, 10);
        assert!(sync.status(&ctx()).await.unwrap().last_sync_at.is_none());
    }

    #[tokio::test]
    async fn test_minority_failure_commits_the_rest() {
        let fx = fixture().await;
        let sync = SyncEngine::new(fx.engine.clone());
        let request = batch(vec![
            entry("20240315-0201", &fx.roti, 3, 15_000),
            entry("20240315-0202", &fx.roti, 3, 15_000),
        ]);

        let report = sync.bulk_ingest(&ctx(), &request).await.unwrap();
        assert_eq!(report.successful_syncs, 1);
        assert_eq!(report.failed_syncs, 1);
        assert_eq!(report.outcomes[1].status, IngestStatus::Failed);
        assert!(report.errors[0].error.contains("Insufficient stock"));

        assert_eq!(stored_sales(&sync).await, 1);
        assert_eq!(fx.stock(&fx.roti).await, 2);
        assert!(sync.status(&ctx()).await.unwrap().last_sync_at.is_some());
    }

    #[tokio::test]
    async fn test_non_server_strategies_record_conflicts() {
        let fx = fixture().await;
        let sync = SyncEngine::new(fx.engine.clone());
        let stored = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();
        let number = stored.sale.sale.order_number.clone();

        for strategy in [
            ConflictStrategy::ClientWins,
            ConflictStrategy::LatestTimestamp,
            ConflictStrategy::Manual,
        ] {
            let mut request = batch(vec![entry(&number, &fx.kopi, 4, 40_000)]);
            request.conflict_strategy = Some(strategy);
            let report = sync.bulk_ingest(&ctx(), &request).await.unwrap();
            assert_eq!(report.conflicts, 1);
            assert_eq!(report.successful_syncs, 0);
            assert_eq!(report.outcomes[0].status, IngestStatus::Unresolved);
            assert!(report.outcomes[0].conflict_id.is_some());
        }

        let unchanged = fx.engine.get(&ctx(), &stored.sale.sale.id).await.unwrap();
        assert_eq!(unchanged.sale.updated_at, stored.sale.sale.updated_at);
        assert_eq!(unchanged.lines[0].quantity, 1);
        assert_eq!(fx.stock(&fx.kopi).await, 9);
        assert_eq!(stored_sales(&sync).await, 1);
        assert_eq!(sync.status(&ctx()).await.unwrap().pending_conflicts, 3);
    }

    #[tokio::test]
    async fn test_latest_timestamp_never_overwrites() {
        let fx = fixture().await;
        let sync = SyncEngine::new(fx.engine.clone());
        let stored = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.kopi, 1)], &fx.cash, 10_000))
            .await
            .unwrap();

        // Newer device copy of the same order
        fx.clock.advance(Duration::minutes(30));
        let mut newer = entry(&stored.sale.sale.order_number, &fx.kopi, 2, 20_000);
        newer.created_at = Some(fx.clock.now());
        let mut request = batch(vec![newer]);
        request.conflict_strategy = Some(ConflictStrategy::LatestTimestamp);

        let report = sync.bulk_ingest(&ctx(), &request).await.unwrap();
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.outcomes[0].status, IngestStatus::Unresolved);
        assert_eq!(report.outcomes[0].sale_id.as_ref(), Some(&stored.sale.sale.id));

        let unchanged = fx.engine.get(&ctx(), &stored.sale.sale.id).await.unwrap();
        assert_eq!(unchanged.sale.status, SaleStatus::Completed);
        assert_eq!(unchanged.sale.grand_total_cents, stored.sale.sale.grand_total_cents);
        assert_eq!(unchanged.sale.created_at, stored.sale.sale.created_at);
        assert_eq!(unchanged.sale.updated_at, stored.sale.sale.updated_at);
        assert_eq!(unchanged.lines.len(), 1);
        assert_eq!(unchanged.lines[0].quantity, 1);
        assert_eq!(fx.stock(&fx.kopi).await, 9);
    }

    #[tokio::test]
    async fn test_malformed_order_number_leaves_allocation_intact() {
        let fx = fixture().await;
        let sync = SyncEngine::new(fx.engine.clone());
        let request = batch(vec![
            entry("20240315-0003", &fx.kopi, 1, 10_000),
            entry("20240315-99999999999", &fx.kopi, 1, 10_000),
        ]);

        let report = sync.bulk_ingest(&ctx(), &request).await.unwrap();
        assert_eq!(report.successful_syncs, 1);
        assert_eq!(report.failed_syncs, 1);
        assert!(report.errors[0]
            .error
            .contains("Invalid order number: 20240315-99999999999"));

        let next = fx
            .engine
            .create(&ctx(), &sale(vec![line(&fx.paket, 1)], &fx.cash, 100_000))
            .await
            .unwrap();
        assert_eq!(next.sale.sale.order_number, "20240315-0004");
    }

    #[tokio::test]
    async fn test_batch_limits_and_capability() {
        let mut config = EngineConfig::default();
        config.sync.max_batch_size = 2;
        let fx = fixture_with(config).await;
        let sync = SyncEngine::new(fx.engine.clone());

        let err = sync.bulk_ingest(&ctx(), &batch(vec![])).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let oversized = batch(vec![
            entry("a", &fx.kopi, 1, 10_000),
            entry("b", &fx.kopi, 1, 10_000),
            entry("c", &fx.kopi, 1, 10_000),
        ]);
        let err = sync.bulk_ingest(&ctx(), &oversized).await.unwrap_err();
        assert!(matches!(err, EngineError::PayloadTooLarge { size: 3, max: 2 }));

        let reader = IdentityContext::new(TENANT, ACTOR).with_capability(Capability::SyncData);
        let err = sync
            .bulk_ingest(&reader, &batch(vec![entry("a", &fx.kopi, 1, 10_000)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::PermissionDenied {
                capability: Capability::SyncTransactions
            }
        ));
        assert_eq!(fx.audit.events().iter().filter(|e| !e.success).count(), 3);
    }

    #[tokio::test]
    async fn test_validate_only_reports_without_writing() {
        let fx = fixture().await;
        let sync = SyncEngine::new(fx.engine.clone());
        let mut incomplete = IngestTransaction {
            transaction_id: Some("local-9".to_string()),
            payment_method: Some("Voucher".to_string()),
            ..IngestTransaction::default()
        };
        incomplete.items = Some(vec![]);

        let report = sync
            .validate_only(
                &ctx(),
                &ValidateRequest {
                    transactions: vec![entry("20240315-0301", &fx.kopi, 1, 10_000), incomplete],
                },
            )
            .await
            .unwrap();

        assert!(!report.valid);
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.invalid_count, 1);
        assert_eq!(report.errors[0].index, 1);
        assert_eq!(
            report.errors[0].errors,
            vec![
                "Missing order number",
                "Missing items",
                "Missing payment amount",
                "Payment method not found: Voucher",
            ]
        );
        assert_eq!(report.estimated_processing_seconds, 0.3);
        assert_eq!(stored_sales(&sync).await, 0);
    }

    #[test]
    fn test_estimated_processing_caps_overhead() {
        assert_eq!(estimated_processing_seconds(0), 0.0);
        assert_eq!(estimated_processing_seconds(10), 1.5);
        assert_eq!(estimated_processing_seconds(100), 12.0);
    }
}
