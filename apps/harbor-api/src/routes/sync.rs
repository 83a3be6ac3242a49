//! Offline sync endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use harbor_core::SyncConflict;
use harbor_engine::protocol::{
    BulkIngestRequest, CleanupReport, DeltaResponse, Envelope, FullExportRequest, FullExportResponse,
    IngestReport, ResolutionReport, ResolveConflictsRequest, SyncStatus, ValidateRequest, ValidationReport,
};

use super::respond;
use crate::error::ApiResult;
use crate::state::{AppState, Identity};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaQuery {
    pub since_timestamp: DateTime<Utc>,
    /// Comma-separated wire names; absent selects every resource.
    #[serde(default)]
    pub resource_types: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConflictsQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    #[serde(default)]
    pub days_to_keep: Option<u32>,
}

pub async fn delta(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    query: Result<Query<DeltaQuery>, QueryRejection>,
) -> ApiResult<Json<Envelope<DeltaResponse>>> {
    let Query(query) = query?;
    let resource_types: Vec<&str> = query
        .resource_types
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    let delta = state
        .sync
        .delta(&ctx, query.since_timestamp, &resource_types)
        .await?;
    Ok(respond(&state, "Delta sync completed", delta))
}

pub async fn full_export(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    payload: Result<Json<FullExportRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<FullExportResponse>>> {
    let Json(request) = payload?;
    let export = state.sync.full_export(&ctx, &request).await?;
    Ok(respond(&state, "Full sync completed", export))
}

pub async fn bulk_ingest(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    payload: Result<Json<BulkIngestRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<IngestReport>>> {
    let Json(request) = payload?;
    let report = state.sync.bulk_ingest(&ctx, &request).await?;
    Ok(respond(&state, "Transactions synced", report))
}

pub async fn validate(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<ValidationReport>>> {
    let Json(request) = payload?;
    let report = state.sync.validate_only(&ctx, &request).await?;
    let message = if report.valid {
        "All transactions are valid"
    } else {
        "Some transactions are invalid"
    };
    Ok(respond(&state, message, report))
}

pub async fn status(
    State(state): State<AppState>,
    Identity(ctx): Identity,
) -> ApiResult<Json<Envelope<SyncStatus>>> {
    let status = state.sync.status(&ctx).await?;
    Ok(respond(&state, "Sync status", status))
}

pub async fn conflicts(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    query: Result<Query<ConflictsQuery>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<SyncConflict>>>> {
    let Query(query) = query?;
    let conflicts = state.sync.list_conflicts(&ctx, query.limit).await?;
    Ok(respond(&state, "Pending conflicts", conflicts))
}

pub async fn resolve_conflicts(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    payload: Result<Json<ResolveConflictsRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<ResolutionReport>>> {
    let Json(request) = payload?;
    let report = state.sync.resolve_conflicts(&ctx, &request).await?;
    Ok(respond(&state, "Conflicts processed", report))
}

pub async fn cleanup(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    payload: Result<Json<CleanupRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<CleanupReport>>> {
    let Json(request) = payload?;
    let report = state.sync.cleanup(&ctx, request.days_to_keep).await?;
    Ok(respond(&state, "Sync data cleaned up", report))
}
