//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use ledger::LedgerError;
use saga::SagaError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain rule violation.
    Domain(DomainError),
    /// Onboarding or saga error.
    Saga(SagaError),
    /// The request could not be served for a reason the caller cannot fix.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Validation { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::InvariantViolation(_) => {
            tracing::error!(error = %err, "domain invariant violated");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    let status = saga_status(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "request failed");
    }
    (status, err.to_string())
}

/// Maps a saga error to the status code reported to the caller.
pub fn saga_status(err: &SagaError) -> StatusCode {
    if let SagaError::Failed(failure) = err
        && failure.is_inconsistent()
    {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    if err.is_not_found() {
        return StatusCode::NOT_FOUND;
    }
    if err.is_conflict() {
        return StatusCode::CONFLICT;
    }
    match err {
        SagaError::Validation(_)
        | SagaError::Domain(DomainError::Validation { .. })
        | SagaError::Ledger(LedgerError::InvalidArgument(_))
        | SagaError::Ledger(LedgerError::Domain(DomainError::Validation { .. })) => {
            StatusCode::BAD_REQUEST
        }
        SagaError::Failed(_)
        | SagaError::Identity(_)
        | SagaError::Payment(_)
        | SagaError::Ledger(LedgerError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
        SagaError::ConnectorExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SagaError::DeadlineExceeded | SagaError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}
