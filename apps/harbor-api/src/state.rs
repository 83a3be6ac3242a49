//! Shared application state and the identity extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::warn;

use harbor_core::{Capability, IdentityContext};
use harbor_engine::{SyncEngine, TransactionEngine};

use crate::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";
pub const CAPABILITIES_HEADER: &str = "x-capabilities";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: TransactionEngine,
    pub sync: SyncEngine,
}

impl AppState {
    pub fn new(engine: TransactionEngine) -> Self {
        let sync = SyncEngine::new(engine.clone());
        AppState { engine, sync }
    }
}

/// Caller identity as asserted by the upstream auth gateway.
#[derive(Debug, Clone)]
pub struct Identity(pub IdentityContext);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers).map(Identity)
    }
}

fn identity_from_headers(headers: &HeaderMap) -> Result<IdentityContext, ApiError> {
    let tenant_id = required_header(headers, TENANT_HEADER)?;
    let actor_id = required_header(headers, ACTOR_HEADER)?;

    let mut ctx = IdentityContext::new(tenant_id, actor_id);
    let granted = headers
        .get(CAPABILITIES_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    for name in granted.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        match name.parse::<Capability>() {
            Ok(capability) => ctx = ctx.with_capability(capability),
            // Gateways may grant capabilities this server doesn't know yet
            Err(_) => warn!(capability = name, "Ignoring unknown capability"),
        }
    }
    Ok(ctx)
}

fn required_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingIdentity(name))
}
