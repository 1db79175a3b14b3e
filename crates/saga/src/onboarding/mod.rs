//! Merchant onboarding operations.
//!
//! [`MerchantOnboarding`] owns the collaborators and the coordinator. The
//! four multi-collaborator operations (create, deactivate, reactivate and
//! email update) run as sagas; the rest touch one collaborator at a time.
//! Every operation that mutates an existing account holds that account's
//! lock for its whole duration.

mod locks;
pub mod sagas;

use std::sync::Arc;

use common::{AccountId, ConnectedAccountId, EmployerId};
use domain::{
    MerchantAccount, OnboardingDetail, OnboardingState, advance, advance_until, validate_email,
};
use ledger::{Ledger, LedgerError};
use serde::{Deserialize, Serialize};

use crate::context::SagaContext;
use crate::coordinator::SagaCoordinator;
use crate::error::SagaError;
use crate::services::{Identity, PaymentProcessor};
use crate::step::Handoff;

pub use locks::AccountLocks;

/// Profile fields a merchant may change. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChanges {
    pub business_name: Option<String>,
    pub business_email: Option<String>,
    pub employer_id: Option<EmployerId>,
}

/// Hosted payment-onboarding link for a connected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingLink {
    pub connected_account_id: ConnectedAccountId,
    pub url: String,
}

/// Orchestrates merchant onboarding across identity, ledger and payments.
pub struct MerchantOnboarding<I, L, P> {
    identity: Arc<I>,
    ledger: Arc<L>,
    payments: Arc<P>,
    coordinator: SagaCoordinator,
    locks: AccountLocks,
}

impl<I, L, P> Clone for MerchantOnboarding<I, L, P> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            ledger: Arc::clone(&self.ledger),
            payments: Arc::clone(&self.payments),
            coordinator: self.coordinator.clone(),
            locks: self.locks.clone(),
        }
    }
}

fn require_id(id: AccountId) -> Result<(), SagaError> {
    if id.is_unassigned() {
        return Err(SagaError::Validation(
            "merchant account id cannot be 0".to_string(),
        ));
    }
    Ok(())
}

fn link_url(base: &str, connected_account_id: &ConnectedAccountId) -> String {
    format!("{}/{}", base.trim_end_matches('/'), connected_account_id)
}

impl<I, L, P> MerchantOnboarding<I, L, P>
where
    I: Identity + 'static,
    L: Ledger + 'static,
    P: PaymentProcessor + 'static,
{
    pub fn new(
        identity: Arc<I>,
        ledger: Arc<L>,
        payments: Arc<P>,
        coordinator: SagaCoordinator,
    ) -> Self {
        Self {
            identity,
            ledger,
            payments,
            coordinator,
            locks: AccountLocks::new(),
        }
    }

    pub fn identity(&self) -> &Arc<I> {
        &self.identity
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn payments(&self) -> &Arc<P> {
        &self.payments
    }

    /// Creates the identity login and the ledger record for a new merchant.
    ///
    /// If the ledger rejects the record the identity login is locked again.
    #[tracing::instrument(skip(self, ctx, account, secret), fields(email = %account.business_email))]
    pub async fn create_merchant_account(
        &self,
        ctx: &SagaContext,
        mut account: MerchantAccount,
        secret: &str,
    ) -> Result<MerchantAccount, SagaError> {
        account
            .validate_profile()
            .map_err(|e| SagaError::Validation(e.to_string()))?;
        if secret.is_empty() {
            return Err(SagaError::Validation("password cannot be empty".to_string()));
        }
        account.id = AccountId::default();
        account.active = true;
        account.connected_account_id = None;
        account.onboarding_state = OnboardingState::PendingCompletion;
        account.onboarding_detail = OnboardingDetail::NotStarted;

        let created = Handoff::new();
        let saga = sagas::create_merchant_account(
            &self.identity,
            &self.ledger,
            account,
            secret.to_string(),
            created.clone(),
        )?;
        self.coordinator.run_saga(ctx, &saga).await?;

        let account = created.require()?;
        tracing::info!(account_id = %account.id, identity_id = %account.identity_id, "merchant account created");
        Ok(account)
    }

    /// Fails with a ledger conflict when an active account already uses
    /// `email`. Lets callers reject a duplicate before any identity call.
    pub async fn ensure_email_available(
        &self,
        ctx: &SagaContext,
        email: &str,
    ) -> Result<(), SagaError> {
        match ctx.bounded(self.ledger.find_by_email(email)).await? {
            Some(existing) => {
                tracing::debug!(account_id = %existing.id, "business email already registered");
                Err(LedgerError::AlreadyExists(email.to_string()).into())
            }
            None => Ok(()),
        }
    }

    /// Locks the identity login and deactivates the ledger record.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn deactivate_merchant_account(
        &self,
        ctx: &SagaContext,
        id: AccountId,
    ) -> Result<(), SagaError> {
        require_id(id)?;
        let _guard = self.locks.lock(id).await;

        let account = ctx.bounded(self.ledger.get_account_by_id(id)).await?;
        let saga =
            sagas::deactivate_merchant_account(&self.identity, &self.ledger, id, account.identity_id)?;
        self.coordinator.run_saga(ctx, &saga).await?;

        tracing::info!("merchant account deactivated");
        Ok(())
    }

    /// Unlocks the identity login and reactivates the ledger record.
    ///
    /// An account that is already active is returned without running the saga.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn reactivate_merchant_account(
        &self,
        ctx: &SagaContext,
        id: AccountId,
    ) -> Result<MerchantAccount, SagaError> {
        require_id(id)?;
        let _guard = self.locks.lock(id).await;

        let account = ctx.bounded(self.ledger.get_account_by_id(id)).await?;
        if account.active {
            tracing::debug!("merchant account already active");
            return Ok(account);
        }

        let saga =
            sagas::reactivate_merchant_account(&self.identity, &self.ledger, id, account.identity_id)?;
        self.coordinator.run_saga(ctx, &saga).await?;

        tracing::info!("merchant account reactivated");
        ctx.bounded(self.ledger.get_account_by_id(id)).await
    }

    /// Changes the business email in the identity service and the ledger.
    #[tracing::instrument(skip(self, ctx, new_email))]
    pub async fn update_merchant_account_email(
        &self,
        ctx: &SagaContext,
        id: AccountId,
        new_email: &str,
    ) -> Result<MerchantAccount, SagaError> {
        self.update_merchant_account(
            ctx,
            id,
            AccountChanges {
                business_email: Some(new_email.to_string()),
                ..AccountChanges::default()
            },
        )
        .await
    }

    pub async fn get_merchant_account(
        &self,
        ctx: &SagaContext,
        id: AccountId,
    ) -> Result<MerchantAccount, SagaError> {
        require_id(id)?;
        ctx.bounded(self.ledger.get_account_by_id(id)).await
    }

    /// Applies profile changes.
    ///
    /// Changes that keep the email are a plain ledger save. An email change
    /// runs the email-update saga, with the other changes saved in its
    /// ledger step.
    #[tracing::instrument(skip(self, ctx, changes))]
    pub async fn update_merchant_account(
        &self,
        ctx: &SagaContext,
        id: AccountId,
        changes: AccountChanges,
    ) -> Result<MerchantAccount, SagaError> {
        require_id(id)?;
        if let Some(email) = &changes.business_email {
            validate_email(email).map_err(|e| SagaError::Validation(e.to_string()))?;
        }
        let _guard = self.locks.lock(id).await;

        let snapshot = ctx.bounded(self.ledger.get_account_by_id(id)).await?;
        if !snapshot.active {
            return Err(SagaError::Validation(format!(
                "merchant account {id} is deactivated"
            )));
        }

        let mut updated = snapshot.clone();
        if let Some(name) = changes.business_name {
            updated.business_name = name;
        }
        if let Some(employer_id) = changes.employer_id {
            updated.employer_id = employer_id;
        }
        if let Some(email) = changes.business_email {
            updated.business_email = email;
        }
        updated
            .validate_profile()
            .map_err(|e| SagaError::Validation(e.to_string()))?;

        if updated == snapshot {
            return Ok(snapshot);
        }

        if updated.business_email == snapshot.business_email {
            ctx.bounded(self.ledger.save_account(&updated)).await?;
        } else {
            let saga = sagas::update_merchant_account_email(
                &self.identity,
                &self.ledger,
                snapshot,
                updated,
            )?;
            self.coordinator.run_saga(ctx, &saga).await?;
        }

        ctx.bounded(self.ledger.get_account_by_id(id)).await
    }

    /// Starts payment onboarding and returns the hosted onboarding link.
    ///
    /// Creates the connected account on first use and reuses it afterwards.
    /// The refresh and return URLs are `{base}/{connected_account_id}`.
    #[tracing::instrument(skip(self, ctx, refresh_base, return_base))]
    pub async fn start_payment_onboarding(
        &self,
        ctx: &SagaContext,
        id: AccountId,
        refresh_base: &str,
        return_base: &str,
    ) -> Result<OnboardingLink, SagaError> {
        require_id(id)?;
        let _guard = self.locks.lock(id).await;

        let mut account = ctx.bounded(self.ledger.get_account_by_id(id)).await?;
        if !account.active {
            return Err(SagaError::Validation(format!(
                "merchant account {id} is deactivated"
            )));
        }

        let connected_account_id = match account.connected_account_id.clone() {
            Some(existing) => existing,
            None => {
                let created = ctx
                    .bounded(self.payments.create_connected_account(&account))
                    .await?;
                account.connected_account_id = Some(created.clone());
                created
            }
        };

        let account = advance_until(account, OnboardingDetail::PaymentOnboardingStarted);
        ctx.bounded(self.ledger.save_account(&account)).await?;
        tracing::info!(connected_account_id = %connected_account_id, "payment onboarding started");

        self.onboarding_link(ctx, connected_account_id, refresh_base, return_base)
            .await
    }

    /// Issues a fresh onboarding link for an existing connected account.
    #[tracing::instrument(skip(self, ctx, refresh_base, return_base))]
    pub async fn refresh_onboarding_link(
        &self,
        ctx: &SagaContext,
        connected_account_id: &ConnectedAccountId,
        refresh_base: &str,
        return_base: &str,
    ) -> Result<OnboardingLink, SagaError> {
        ctx.bounded(self.ledger.find_by_connected_account_id(connected_account_id))
            .await?;
        self.onboarding_link(ctx, connected_account_id.clone(), refresh_base, return_base)
            .await
    }

    async fn onboarding_link(
        &self,
        ctx: &SagaContext,
        connected_account_id: ConnectedAccountId,
        refresh_base: &str,
        return_base: &str,
    ) -> Result<OnboardingLink, SagaError> {
        let refresh_url = link_url(refresh_base, &connected_account_id);
        let return_url = link_url(return_base, &connected_account_id);
        let url = ctx
            .bounded(self.payments.create_onboarding_link(
                &connected_account_id,
                &refresh_url,
                &return_url,
            ))
            .await?;
        Ok(OnboardingLink {
            connected_account_id,
            url,
        })
    }

    /// Records the processor's view of payment onboarding.
    ///
    /// Submitted details complete the payment phase; otherwise the account
    /// stays at `PaymentOnboardingStarted`. Accounts already past the
    /// payment phase are left alone.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn complete_payment_onboarding(
        &self,
        ctx: &SagaContext,
        connected_account_id: &ConnectedAccountId,
    ) -> Result<MerchantAccount, SagaError> {
        let found = ctx
            .bounded(self.ledger.find_by_connected_account_id(connected_account_id))
            .await?;
        let _guard = self.locks.lock(found.id).await;

        let status = ctx
            .bounded(self.payments.get_connected_account(connected_account_id))
            .await?;
        let account = ctx.bounded(self.ledger.get_account_by_id(found.id)).await?;

        let target = if status.details_submitted {
            OnboardingDetail::PaymentOnboardingCompleted
        } else {
            OnboardingDetail::PaymentOnboardingStarted
        };
        let advanced = advance_until(account.clone(), target);
        if advanced != account {
            ctx.bounded(self.ledger.save_account(&advanced)).await?;
        }

        tracing::info!(
            account_id = %advanced.id,
            charges_enabled = status.charges_enabled,
            details_submitted = status.details_submitted,
            detail = %advanced.onboarding_detail,
            "payment onboarding status recorded"
        );
        Ok(advanced)
    }

    /// Moves the account one onboarding phase forward and saves it.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn advance_onboarding(
        &self,
        ctx: &SagaContext,
        id: AccountId,
    ) -> Result<MerchantAccount, SagaError> {
        require_id(id)?;
        let _guard = self.locks.lock(id).await;

        let account = ctx.bounded(self.ledger.get_account_by_id(id)).await?;
        if account.onboarding_detail == OnboardingDetail::Unrecognized {
            tracing::warn!("unrecognized onboarding detail, restarting onboarding");
        }
        if account.onboarding_detail.is_terminal() {
            return Ok(account);
        }

        let advanced = advance(account);
        ctx.bounded(self.ledger.save_account(&advanced)).await?;
        Ok(advanced)
    }
}
