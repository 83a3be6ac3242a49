//! Stock ledger endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use harbor_core::{InventoryRecord, LedgerEntry, MovementKind};
use harbor_db::Reconciliation;
use harbor_engine::protocol::Envelope;

use super::respond;
use crate::error::ApiResult;
use crate::state::{AppState, Identity};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInventoryRequest {
    pub opening_stock: i64,
    #[serde(default)]
    pub minimum_stock: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementBody {
    pub kind: MovementKind,
    pub quantity: i64,
    pub note: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelsRequest {
    pub minimum_stock: i64,
    #[serde(default)]
    pub reserved_stock: i64,
}

pub async fn open(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    item_id: Result<Path<String>, PathRejection>,
    payload: Result<Json<OpenInventoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<InventoryRecord>>)> {
    let Path(item_id) = item_id?;
    let Json(request) = payload?;
    let record = state
        .engine
        .open_inventory(&ctx, &item_id, request.opening_stock, request.minimum_stock)
        .await?;
    Ok((StatusCode::CREATED, respond(&state, "Inventory opened", record)))
}

pub async fn adjust(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    item_id: Result<Path<String>, PathRejection>,
    payload: Result<Json<MovementBody>, JsonRejection>,
) -> ApiResult<Json<Envelope<LedgerEntry>>> {
    let Path(item_id) = item_id?;
    let Json(body) = payload?;
    let entry = state
        .engine
        .adjust_stock(&ctx, &item_id, body.kind, body.quantity, &body.note)
        .await?;
    Ok(respond(&state, "Stock movement recorded", entry))
}

pub async fn levels(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    item_id: Result<Path<String>, PathRejection>,
    payload: Result<Json<LevelsRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<InventoryRecord>>> {
    let Path(item_id) = item_id?;
    let Json(request) = payload?;
    let record = state
        .engine
        .set_stock_levels(&ctx, &item_id, request.minimum_stock, request.reserved_stock)
        .await?;
    Ok(respond(&state, "Stock levels updated", record))
}

pub async fn ledger(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    item_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Envelope<Vec<LedgerEntry>>>> {
    let Path(item_id) = item_id?;
    let entries = state.engine.ledger(&ctx, &item_id).await?;
    Ok(respond(&state, "Ledger entries", entries))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    item_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Envelope<Reconciliation>>> {
    let Path(item_id) = item_id?;
    let reconciliation = state.engine.reconcile(&ctx, &item_id).await?;
    Ok(respond(&state, "Ledger reconciled", reconciliation))
}

pub async fn low_stock(
    State(state): State<AppState>,
    Identity(ctx): Identity,
) -> ApiResult<Json<Envelope<Vec<InventoryRecord>>>> {
    let records = state.engine.low_stock(&ctx).await?;
    Ok(respond(&state, "Low stock items", records))
}
