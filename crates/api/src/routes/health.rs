//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use ledger::Ledger;
use serde::Serialize;

use super::merchants::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledger: &'static str,
}

/// GET /health — reports whether the ledger answers.
pub async fn check<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.onboarding.ledger().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                ledger: "ok",
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "ledger health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    ledger: "unavailable",
                }),
            )
        }
    }
}
