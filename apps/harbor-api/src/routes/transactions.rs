//! Sale lifecycle endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use harbor_core::tax::TaxValidation;
use harbor_core::SaleWithLines;
use harbor_engine::protocol::{CreateSaleRequest, Envelope, RefundRequest, SaleReceipt, VoidRequest};

use super::respond;
use crate::error::ApiResult;
use crate::state::{AppState, Identity};

pub async fn create(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    payload: Result<Json<CreateSaleRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<SaleReceipt>>)> {
    let Json(request) = payload?;
    let receipt = state.engine.create(&ctx, &request).await?;
    Ok((StatusCode::CREATED, respond(&state, "Transaction created", receipt)))
}

pub async fn show(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Envelope<SaleWithLines>>> {
    let Path(id) = id?;
    let sale = state.engine.get(&ctx, &id).await?;
    Ok(respond(&state, "Transaction found", sale))
}

pub async fn show_by_number(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    order_number: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Envelope<SaleWithLines>>> {
    let Path(order_number) = order_number?;
    let sale = state.engine.find_by_order_number(&ctx, &order_number).await?;
    Ok(respond(&state, "Transaction found", sale))
}

pub async fn void(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<VoidRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<SaleWithLines>>> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let sale = state.engine.void(&ctx, &id, &request.reason).await?;
    Ok(respond(&state, "Transaction voided", sale))
}

pub async fn refund(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<RefundRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<SaleWithLines>>> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let sale = state
        .engine
        .refund(&ctx, &id, &request.line_ids, &request.reason)
        .await?;
    Ok(respond(&state, "Transaction refunded", sale))
}

pub async fn validate_tax(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Envelope<TaxValidation>>> {
    let Path(id) = id?;
    let validation = state.engine.validate_tax(&ctx, &id).await?;
    Ok(respond(&state, "Tax validated", validation))
}
