//! Merchant account and payment onboarding endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{AccountId, ConnectedAccountId, EmployerId};
use domain::MerchantAccount;
use ledger::Ledger;
use saga::{
    AccountChanges, InMemoryIdentityService, InMemoryPaymentProcessor, MerchantOnboarding,
    OnboardingLink, SagaContext, SagaError,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::ApiError;

pub type Onboarding<L> = MerchantOnboarding<InMemoryIdentityService, L, InMemoryPaymentProcessor>;

/// Shared application state accessible from all handlers.
pub struct AppState<L: Ledger> {
    pub onboarding: Onboarding<L>,
    /// Deadline applied to the sagas a single request runs.
    pub request_timeout: Duration,
    pub refresh_url: String,
    pub return_url: String,
}

impl<L: Ledger + 'static> AppState<L> {
    fn context(&self) -> SagaContext {
        SagaContext::new().with_timeout(self.request_timeout)
    }

    /// Runs `op` on its own task under a fresh request context.
    ///
    /// Dropping the returned future (a client disconnect) cancels the
    /// context instead of the task, so a saga interrupted mid-step still
    /// compensates to completion.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(Onboarding<L>, SagaContext) -> Fut,
        Fut: Future<Output = Result<T, SagaError>> + Send + 'static,
    {
        let ctx = self.context();
        let _cancel_on_drop = ctx.cancellation_token().clone().drop_guard();
        let task = tokio::spawn(op(self.onboarding.clone(), ctx).in_current_span());
        match task.await {
            Ok(result) => result.map_err(ApiError::from),
            Err(err) => Err(ApiError::Internal(format!("onboarding task failed: {err}"))),
        }
    }
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateMerchantRequest {
    pub merchant_account: MerchantProfile,
    pub password: String,
    pub confirmed_password: String,
}

#[derive(Deserialize)]
pub struct MerchantProfile {
    pub business_name: String,
    pub business_email: String,
    pub employer_id: u64,
}

// -- Response types --

#[derive(Serialize)]
pub struct MerchantCreatedResponse {
    pub merchant_account: MerchantAccount,
    pub onboarding_link: OnboardingLink,
}

// -- Handlers --

/// POST /merchants — create the merchant account and start payment onboarding.
#[tracing::instrument(skip(state, req), fields(email = %req.merchant_account.business_email))]
pub async fn create<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Json(req): Json<CreateMerchantRequest>,
) -> Result<(StatusCode, Json<MerchantCreatedResponse>), ApiError> {
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password cannot be empty".to_string()));
    }
    if req.password != req.confirmed_password {
        return Err(ApiError::BadRequest(
            "password and confirmed password do not match".to_string(),
        ));
    }

    let profile = req.merchant_account;
    let account = MerchantAccount::new(
        profile.business_name,
        profile.business_email,
        EmployerId::new(profile.employer_id),
    );
    account.validate_profile()?;

    let password = req.password;
    let refresh_url = state.refresh_url.clone();
    let return_url = state.return_url.clone();
    let response = state
        .run(move |onboarding, ctx| async move {
            onboarding
                .ensure_email_available(&ctx, &account.business_email)
                .await?;
            let created = onboarding
                .create_merchant_account(&ctx, account, &password)
                .await?;
            let onboarding_link = onboarding
                .start_payment_onboarding(&ctx, created.id, &refresh_url, &return_url)
                .await?;
            let merchant_account = onboarding.get_merchant_account(&ctx, created.id).await?;
            Ok(MerchantCreatedResponse {
                merchant_account,
                onboarding_link,
            })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /merchants/{id} — fetch a merchant account.
#[tracing::instrument(skip(state))]
pub async fn get<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<u64>,
) -> Result<Json<MerchantAccount>, ApiError> {
    let account = state
        .onboarding
        .get_merchant_account(&state.context(), AccountId::new(id))
        .await?;
    Ok(Json(account))
}

/// PUT /merchants/{id} — change the business name, email, or employer.
#[tracing::instrument(skip(state, changes))]
pub async fn update<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<u64>,
    Json(changes): Json<AccountChanges>,
) -> Result<Json<MerchantAccount>, ApiError> {
    let account = state
        .run(move |onboarding, ctx| async move {
            onboarding
                .update_merchant_account(&ctx, AccountId::new(id), changes)
                .await
        })
        .await?;
    Ok(Json(account))
}

/// DELETE /merchants/{id} — deactivate the account; the record is kept.
#[tracing::instrument(skip(state))]
pub async fn deactivate<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state
        .run(move |onboarding, ctx| async move {
            onboarding
                .deactivate_merchant_account(&ctx, AccountId::new(id))
                .await
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /merchants/{id}/reactivate — undo a deactivation.
#[tracing::instrument(skip(state))]
pub async fn reactivate<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<u64>,
) -> Result<Json<MerchantAccount>, ApiError> {
    let account = state
        .run(move |onboarding, ctx| async move {
            onboarding
                .reactivate_merchant_account(&ctx, AccountId::new(id))
                .await
        })
        .await?;
    Ok(Json(account))
}

/// POST /merchants/{id}/onboarding/start — start or resume payment onboarding.
///
/// Reuses the connected account when one exists, so it also recovers a
/// merchant whose creation stopped before the processor answered.
#[tracing::instrument(skip(state))]
pub async fn start<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<u64>,
) -> Result<Json<OnboardingLink>, ApiError> {
    let refresh_url = state.refresh_url.clone();
    let return_url = state.return_url.clone();
    let link = state
        .run(move |onboarding, ctx| async move {
            onboarding
                .start_payment_onboarding(&ctx, AccountId::new(id), &refresh_url, &return_url)
                .await
        })
        .await?;
    Ok(Json(link))
}

/// POST /merchants/{id}/onboarding/advance — move one onboarding phase forward.
#[tracing::instrument(skip(state))]
pub async fn advance<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<u64>,
) -> Result<Json<MerchantAccount>, ApiError> {
    let account = state
        .run(move |onboarding, ctx| async move {
            onboarding.advance_onboarding(&ctx, AccountId::new(id)).await
        })
        .await?;
    Ok(Json(account))
}

/// GET /merchants/onboarding/refresh/{connected_id} — issue a fresh onboarding link.
#[tracing::instrument(skip(state))]
pub async fn refresh<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(connected_id): Path<String>,
) -> Result<Json<OnboardingLink>, ApiError> {
    let link = state
        .onboarding
        .refresh_onboarding_link(
            &state.context(),
            &ConnectedAccountId::new(connected_id),
            &state.refresh_url,
            &state.return_url,
        )
        .await?;
    Ok(Json(link))
}

/// GET /merchants/onboarding/return/{connected_id} — record the processor's
/// onboarding status after the merchant comes back.
#[tracing::instrument(skip(state))]
pub async fn complete<L: Ledger + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(connected_id): Path<String>,
) -> Result<Json<MerchantAccount>, ApiError> {
    let connected_id = ConnectedAccountId::new(connected_id);
    let account = state
        .run(move |onboarding, ctx| async move {
            onboarding
                .complete_payment_onboarding(&ctx, &connected_id)
                .await
        })
        .await?;
    Ok(Json(account))
}
