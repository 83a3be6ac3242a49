//! # HTTP Routes
//!
//! ```text
//! GET  /health
//!
//! /api/v1
//! ├── POST /transactions                         create
//! ├── GET  /transactions/{id}                    show
//! ├── GET  /transactions/by-number/{number}      show by order number
//! ├── POST /transactions/{id}/void
//! ├── POST /transactions/{id}/refund
//! ├── GET  /transactions/{id}/tax                recompute and compare tax
//! ├── POST /payments/change
//! ├── POST /payments/split
//! ├── GET  /inventory/low-stock
//! ├── POST /inventory/{item_id}                  open tracking
//! ├── PUT  /inventory/{item_id}/levels
//! ├── GET  /inventory/{item_id}/movements        ledger
//! ├── POST /inventory/{item_id}/movements        manual movement
//! ├── GET  /inventory/{item_id}/reconcile
//! ├── GET  /sync/delta?sinceTimestamp=..&resourceTypes=a,b
//! ├── POST /sync/full
//! ├── POST /sync/transactions
//! ├── POST /sync/transactions/validate
//! ├── GET  /sync/status
//! ├── GET  /sync/conflicts
//! ├── POST /sync/conflicts/resolve
//! └── POST /sync/cleanup
//! ```

mod health;
mod inventory;
mod payments;
mod sync;
mod transactions;

use axum::routing::{get, post, put};
use axum::{Json, Router};

use harbor_engine::protocol::Envelope;

use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/transactions", post(transactions::create))
        .route("/transactions/{id}", get(transactions::show))
        .route("/transactions/by-number/{order_number}", get(transactions::show_by_number))
        .route("/transactions/{id}/void", post(transactions::void))
        .route("/transactions/{id}/refund", post(transactions::refund))
        .route("/transactions/{id}/tax", get(transactions::validate_tax))
        .route("/payments/change", post(payments::change))
        .route("/payments/split", post(payments::split))
        .route("/inventory/low-stock", get(inventory::low_stock))
        .route("/inventory/{item_id}", post(inventory::open))
        .route("/inventory/{item_id}/levels", put(inventory::levels))
        .route(
            "/inventory/{item_id}/movements",
            get(inventory::ledger).post(inventory::adjust),
        )
        .route("/inventory/{item_id}/reconcile", get(inventory::reconcile))
        .route("/sync/delta", get(sync::delta))
        .route("/sync/full", post(sync::full_export))
        .route("/sync/transactions", post(sync::bulk_ingest))
        .route("/sync/transactions/validate", post(sync::validate))
        .route("/sync/status", get(sync::status))
        .route("/sync/conflicts", get(sync::conflicts))
        .route("/sync/conflicts/resolve", post(sync::resolve_conflicts))
        .route("/sync/cleanup", post(sync::cleanup));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .with_state(state)
}

/// Success envelope stamped with engine time.
pub(crate) fn respond<T>(state: &AppState, message: &str, data: T) -> Json<Envelope<T>> {
    Json(Envelope::ok(message, data, state.engine.now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, HeaderMap, Method, Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use harbor_core::{CatalogItem, Money, PaymentKind, PaymentMethod};
    use harbor_db::{CatalogRepository, Database, DbConfig, InventoryRepository, PaymentMethodRepository};
    use harbor_engine::{EngineConfig, TransactionEngine};

    use crate::state::{ACTOR_HEADER, CAPABILITIES_HEADER, TENANT_HEADER};

    const TENANT: &str = "toko-1";
    const ALL_CAPS: &str = "sync_data,sync_transactions,full_sync,resolve_conflicts,manage_sync";

    struct TestApp {
        router: Router,
        cash: String,
        kopi: String,
    }

    async fn test_app() -> TestApp {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let at = Utc::now() - Duration::days(1);

        let mut tx = db.begin().await.unwrap();
        let cash = PaymentMethod {
            id: Uuid::new_v4().to_string(),
            tenant_id: TENANT.to_string(),
            name: "Tunai".to_string(),
            kind: PaymentKind::Cash,
            active: true,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        };
        PaymentMethodRepository::new(&mut tx).insert(&cash).await.unwrap();
        let kopi = CatalogItem {
            id: Uuid::new_v4().to_string(),
            tenant_id: TENANT.to_string(),
            sku: "BEV-001".to_string(),
            name: "Kopi".to_string(),
            unit_price_cents: Money::from_major(10_000).cents(),
            tracks_inventory: true,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        };
        CatalogRepository::new(&mut tx).insert(&kopi).await.unwrap();
        InventoryRepository::new(&mut tx)
            .open(TENANT, &kopi.id, 10, 2, "seed", at)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let engine = TransactionEngine::new(db, EngineConfig::default()).unwrap();
        TestApp {
            router: router(AppState::new(engine)),
            cash: cash.id,
            kopi: kopi.id,
        }
    }

    async fn send(
        app: &TestApp,
        method: Method,
        uri: &str,
        body: Option<Value>,
        capabilities: Option<&str>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(TENANT_HEADER, TENANT)
            .header(ACTOR_HEADER, "kasir-1")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(capabilities) = capabilities {
            request = request.header(CAPABILITIES_HEADER, capabilities);
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

        let response = app.router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }

    fn cents(major: i64) -> i64 {
        Money::from_major(major).cents()
    }

    fn offline_entry(order_number: &str, item_id: &str, quantity: i64) -> Value {
        json!({
            "orderNumber": order_number,
            "items": [{ "itemId": item_id, "quantity": quantity }],
            "paymentMethod": "Tunai",
            "paidAmount": cents(10_000 * quantity),
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, _, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], true);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let app = test_app().await;
        let request = Request::builder()
            .uri("/api/v1/sync/status")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_then_void_transaction() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/transactions",
            Some(json!({
                "lines": [{ "itemId": app.kopi, "quantity": 2 }],
                "paymentMethodId": app.cash,
                "tendered": cents(25_000),
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["change"], cents(5_000));
        let sale_id = body["data"]["sale"]["id"].as_str().unwrap().to_string();

        let (status, _, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/transactions/{sale_id}/void"),
            Some(json!({ "reason": "Salah input" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "voided");

        let (status, _, body) = send(&app, Method::GET, "/api/v1/transactions/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_insufficient_stock_maps_to_422() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/transactions",
            Some(json!({
                "lines": [{ "itemId": app.kopi, "quantity": 11 }],
                "paymentMethodId": app.cash,
                "tendered": cents(110_000),
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_delta_needs_capability_and_cursor() {
        let app = test_app().await;
        let since = (Utc::now() - Duration::days(2)).to_rfc3339();
        let uri = format!("/api/v1/sync/delta?sinceTimestamp={}&resourceTypes=items,inventories", since.replace('+', "%2B"));

        let (status, _, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "PERMISSION_DENIED");

        let (status, _, body) = send(&app, Method::GET, &uri, None, Some(ALL_CAPS)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["resources"]["items"]["created"].as_array().unwrap().len(), 1);
        assert!(body["data"]["resources"].get("taxes").is_none());

        let (status, _, body) = send(&app, Method::GET, "/api/v1/sync/delta", None, Some(ALL_CAPS)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_bulk_ingest_and_abort() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/sync/transactions",
            Some(json!({
                "transactions": [
                    offline_entry("20240315-0001", &app.kopi, 1),
                    offline_entry("20240315-0001", &app.kopi, 1),
                ],
                "deviceId": "pos-02",
            })),
            Some(ALL_CAPS),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["successfulSyncs"], 2);
        assert_eq!(body["data"]["outcomes"][1]["status"], "server_kept");

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/sync/transactions",
            Some(json!({
                "transactions": [
                    offline_entry("20240315-0002", "missing-item", 1),
                    offline_entry("20240315-0003", &app.kopi, 0),
                ],
            })),
            Some(ALL_CAPS),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BATCH_ABORTED");
        assert_eq!(body["data"]["failedSyncs"], 2);
    }

    #[tokio::test]
    async fn test_cleanup_rejects_out_of_range_days() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/sync/cleanup",
            Some(json!({ "daysToKeep": 4_294_967_295u64 })),
            Some(ALL_CAPS),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/sync/cleanup",
            Some(json!({ "daysToKeep": 30 })),
            Some(ALL_CAPS),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["removedConflicts"], 0);
    }

    #[tokio::test]
    async fn test_full_export_rate_limit_header() {
        let app = test_app().await;
        let request = json!({ "resourceTypes": ["items"] });

        let (status, _, body) = send(&app, Method::POST, "/api/v1/sync/full", Some(request.clone()), Some(ALL_CAPS)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalRecords"], 1);

        let (status, headers, body) = send(&app, Method::POST, "/api/v1/sync/full", Some(request), Some(ALL_CAPS)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "RATE_LIMITED");
        assert!(headers.contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_change_breakdown() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/payments/change",
            Some(json!({ "due": cents(27_000), "tendered": cents(100_000) })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["change"], cents(73_000));
        assert!(!body["data"]["breakdown"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/transactions",
            Some(json!({ "lines": "not a list" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
