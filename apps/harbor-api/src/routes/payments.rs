//! Payment helpers for the register screen.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use harbor_core::payment::SplitTenderResult;
use harbor_engine::protocol::{ChangeRequest, ChangeResponse, Envelope, SplitTenderRequest};

use super::respond;
use crate::error::ApiResult;
use crate::state::{AppState, Identity};

pub async fn change(
    State(state): State<AppState>,
    Identity(_ctx): Identity,
    payload: Result<Json<ChangeRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<ChangeResponse>>> {
    let Json(request) = payload?;
    let change = state.engine.compute_change(request.due, request.tendered)?;
    Ok(respond(&state, "Change calculated", change))
}

pub async fn split(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    payload: Result<Json<SplitTenderRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<SplitTenderResult>>> {
    let Json(request) = payload?;
    let result = state.engine.split_tender(&ctx, &request).await?;
    Ok(respond(&state, "Split payment calculated", result))
}
