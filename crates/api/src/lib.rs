//! HTTP API server with observability for merchant onboarding.
//!
//! Provides REST endpoints for merchant accounts and payment onboarding,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use ledger::Ledger;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    Identity, InMemoryIdentityService, InMemoryPaymentProcessor, MerchantOnboarding,
    PaymentProcessor, RetryPolicy, SagaCoordinator, SagaError, connect_with_retry,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
pub use routes::merchants::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L: Ledger + 'static>(
    state: Arc<AppState<L>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<L>))
        .route("/merchants", post(routes::merchants::create::<L>))
        .route(
            "/merchants/{id}",
            get(routes::merchants::get::<L>)
                .put(routes::merchants::update::<L>)
                .delete(routes::merchants::deactivate::<L>),
        )
        .route(
            "/merchants/{id}/reactivate",
            post(routes::merchants::reactivate::<L>),
        )
        .route(
            "/merchants/{id}/onboarding/start",
            post(routes::merchants::start::<L>),
        )
        .route(
            "/merchants/{id}/onboarding/advance",
            post(routes::merchants::advance::<L>),
        )
        .route(
            "/merchants/onboarding/refresh/{connected_id}",
            get(routes::merchants::refresh::<L>),
        )
        .route(
            "/merchants/onboarding/return/{connected_id}",
            get(routes::merchants::complete::<L>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around `ledger`, with in-memory identity
/// and payment collaborators.
pub fn create_default_state<L: Ledger + 'static>(ledger: L, config: &Config) -> Arc<AppState<L>> {
    let coordinator = match config.compensation_policy() {
        Some(policy) => SagaCoordinator::new().with_compensation_retry(policy),
        None => SagaCoordinator::new(),
    };
    let onboarding = MerchantOnboarding::new(
        Arc::new(InMemoryIdentityService::new()),
        Arc::new(ledger),
        Arc::new(InMemoryPaymentProcessor::new()),
        coordinator,
    );

    Arc::new(AppState {
        onboarding,
        request_timeout: config.request_timeout,
        refresh_url: config.onboarding_refresh_url.clone(),
        return_url: config.onboarding_return_url.clone(),
    })
}

/// Checks that the identity service and the ledger answer before serving.
///
/// Each collaborator is retried under `policy`; exhaustion is returned as
/// [`SagaError::ConnectorExhausted`].
pub async fn probe_collaborators<I, L, P>(
    onboarding: &MerchantOnboarding<I, L, P>,
    policy: &RetryPolicy,
) -> Result<(), SagaError>
where
    I: Identity + 'static,
    L: Ledger + 'static,
    P: PaymentProcessor + 'static,
{
    let identity = onboarding.identity();
    let stats = connect_with_retry("identity", policy, move || identity.server_stats()).await?;
    tracing::info!(
        accounts = stats.accounts,
        locked_accounts = stats.locked_accounts,
        "identity service ready"
    );

    let ledger = onboarding.ledger();
    connect_with_retry("ledger", policy, move || ledger.ping()).await?;
    tracing::info!("ledger ready");
    Ok(())
}
