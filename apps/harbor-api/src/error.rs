//! Error types for the HTTP layer.
//!
//! Every failure leaves as the standard envelope with `success: false` and
//! a machine-readable `code`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use harbor_engine::protocol::Envelope;
use harbor_engine::{EngineError, ErrorCode};

pub type ApiResult<T> = Result<T, ApiError>;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Identity headers absent; the auth gateway didn't run.
    #[error("Missing identity header: {0}")]
    MissingIdentity(&'static str),

    /// Body, query or path could not be decoded.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(err) => status_for(err.code()),
            ApiError::MissingIdentity(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// HTTP status for each engine error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationError
        | ErrorCode::InvalidPaymentMethod
        | ErrorCode::InsufficientStock
        | ErrorCode::InsufficientPayment
        | ErrorCode::NotVoidable
        | ErrorCode::NotRefundable
        | ErrorCode::BatchAborted => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::AllocationFailed => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::SystemError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let now = Utc::now();
        let envelope = match &self {
            ApiError::Engine(err) => Envelope::from_error(err, now),
            ApiError::MissingIdentity(_) => failure(self.to_string(), ErrorCode::PermissionDenied, now),
            ApiError::BadRequest(_) => failure(self.to_string(), ErrorCode::ValidationError, now),
        };

        let mut response = (status, Json(envelope)).into_response();
        if let ApiError::Engine(EngineError::RateLimited { retry_after_secs }) = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

fn failure(message: String, code: ErrorCode, at: chrono::DateTime<Utc>) -> Envelope<serde_json::Value> {
    Envelope {
        success: false,
        errors: Some(vec![message.clone()]),
        message,
        data: None,
        code: Some(code),
        timestamp: at,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCode::InsufficientStock), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorCode::PayloadTooLarge), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ApiError::MissingIdentity("x-tenant-id").status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::from(EngineError::RateLimited { retry_after_secs: 90 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "90");
    }
}
