//! The four onboarding sagas.
//!
//! Each builder returns a checked [`Saga`] whose steps own clones of the
//! collaborators they call, so the saga can run on any task.

use std::sync::Arc;

use common::{AccountId, IdentityId};
use domain::{MerchantAccount, OnboardingDetail, advance_until};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use ledger::Ledger;

use crate::context::SagaContext;
use crate::error::SagaError;
use crate::saga::Saga;
use crate::services::Identity;
use crate::step::{Handoff, Step};

pub const CREATE_MERCHANT_ACCOUNT: &str = "create_merchant_account";
pub const DEACTIVATE_MERCHANT_ACCOUNT: &str = "deactivate_merchant_account";
pub const REACTIVATE_MERCHANT_ACCOUNT: &str = "reactivate_merchant_account";
pub const UPDATE_MERCHANT_ACCOUNT_EMAIL: &str = "update_merchant_account_email";

/// Wraps a collaborator call into a step action bounded by the run context.
fn invoke<S, F, E>(
    service: &Arc<S>,
    op: F,
) -> impl Fn(SagaContext) -> BoxFuture<'static, Result<(), SagaError>> + Send + Sync + 'static
where
    S: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<S>) -> BoxFuture<'static, Result<(), E>> + Send + Sync + 'static,
    E: Into<SagaError> + 'static,
{
    let service = Arc::clone(service);
    move |ctx: SagaContext| {
        let call = op(Arc::clone(&service));
        async move { ctx.bounded(call).await }.boxed()
    }
}

/// Identity.CreateAccount, then Ledger.CreateAccount.
///
/// The identity id travels to the ledger step and to the lock compensation
/// through a handoff. The stored account is put into `created`.
pub(crate) fn create_merchant_account<I, L>(
    identity: &Arc<I>,
    ledger: &Arc<L>,
    account: MerchantAccount,
    secret: String,
    created: Handoff<MerchantAccount>,
) -> Result<Saga, SagaError>
where
    I: Identity + 'static,
    L: Ledger + 'static,
{
    let identity_id: Handoff<IdentityId> = Handoff::new();

    let create_identity = {
        let identity = Arc::clone(identity);
        let email = account.business_email.clone();
        let identity_id = identity_id.clone();
        move |ctx: SagaContext| {
            let identity = Arc::clone(&identity);
            let email = email.clone();
            let secret = secret.clone();
            let identity_id = identity_id.clone();
            async move {
                let id = ctx
                    .bounded(identity.create_account(&email, &secret, false))
                    .await?;
                identity_id.put(id)
            }
        }
    };

    let lock_identity = {
        let identity = Arc::clone(identity);
        let identity_id = identity_id.clone();
        move |ctx: SagaContext| {
            let identity = Arc::clone(&identity);
            let identity_id = identity_id.clone();
            async move {
                let id = identity_id.require()?;
                ctx.bounded(identity.lock_account(id)).await
            }
        }
    };

    let create_record = {
        let ledger = Arc::clone(ledger);
        move |ctx: SagaContext| {
            let ledger = Arc::clone(&ledger);
            let identity_id = identity_id.clone();
            let created = created.clone();
            let mut account = account.clone();
            async move {
                account.identity_id = identity_id.require()?;
                let account =
                    advance_until(account, OnboardingDetail::IdentityOnboardingStarted);
                let stored = ctx.bounded(ledger.create_account(account)).await?;
                created.put(stored)
            }
        }
    };

    Saga::checked(
        CREATE_MERCHANT_ACCOUNT,
        vec![
            Step::new("create_identity_account", create_identity).with_compensation(lock_identity),
            Step::new("create_ledger_account", create_record),
        ],
    )
}

/// Identity.LockAccount, then Ledger.DeactivateAccount.
pub(crate) fn deactivate_merchant_account<I, L>(
    identity: &Arc<I>,
    ledger: &Arc<L>,
    account_id: AccountId,
    identity_id: IdentityId,
) -> Result<Saga, SagaError>
where
    I: Identity + 'static,
    L: Ledger + 'static,
{
    Saga::checked(
        DEACTIVATE_MERCHANT_ACCOUNT,
        vec![
            Step::new(
                "lock_identity_account",
                invoke(identity, move |svc| {
                    async move { svc.lock_account(identity_id).await }.boxed()
                }),
            )
            .with_compensation(invoke(identity, move |svc| {
                async move { svc.unlock_account(identity_id).await }.boxed()
            })),
            Step::new(
                "deactivate_ledger_account",
                invoke(ledger, move |svc| {
                    async move { svc.deactivate_account(account_id).await }.boxed()
                }),
            )
            .with_compensation(invoke(ledger, move |svc| {
                async move { svc.activate_account(account_id).await }.boxed()
            })),
        ],
    )
}

/// Identity.UnlockAccount, then Ledger.ActivateAccount.
pub(crate) fn reactivate_merchant_account<I, L>(
    identity: &Arc<I>,
    ledger: &Arc<L>,
    account_id: AccountId,
    identity_id: IdentityId,
) -> Result<Saga, SagaError>
where
    I: Identity + 'static,
    L: Ledger + 'static,
{
    Saga::checked(
        REACTIVATE_MERCHANT_ACCOUNT,
        vec![
            Step::new(
                "unlock_identity_account",
                invoke(identity, move |svc| {
                    async move { svc.unlock_account(identity_id).await }.boxed()
                }),
            )
            .with_compensation(invoke(identity, move |svc| {
                async move { svc.lock_account(identity_id).await }.boxed()
            })),
            Step::new(
                "activate_ledger_account",
                invoke(ledger, move |svc| {
                    async move { svc.activate_account(account_id).await }.boxed()
                }),
            )
            .with_compensation(invoke(ledger, move |svc| {
                async move { svc.deactivate_account(account_id).await }.boxed()
            })),
        ],
    )
}

/// Identity.UpdateEmail, then Ledger.SaveAccount.
///
/// `updated` is written on the way forward; `snapshot` is the pre-saga
/// record restored on rollback.
pub(crate) fn update_merchant_account_email<I, L>(
    identity: &Arc<I>,
    ledger: &Arc<L>,
    snapshot: MerchantAccount,
    updated: MerchantAccount,
) -> Result<Saga, SagaError>
where
    I: Identity + 'static,
    L: Ledger + 'static,
{
    let identity_id = snapshot.identity_id;
    let new_email = updated.business_email.clone();
    let old_email = snapshot.business_email.clone();

    Saga::checked(
        UPDATE_MERCHANT_ACCOUNT_EMAIL,
        vec![
            Step::new(
                "update_identity_email",
                invoke(identity, move |svc| {
                    let email = new_email.clone();
                    async move { svc.update_email(identity_id, &email).await }.boxed()
                }),
            )
            .with_compensation(invoke(identity, move |svc| {
                let email = old_email.clone();
                async move { svc.update_email(identity_id, &email).await }.boxed()
            })),
            Step::new(
                "save_ledger_account",
                invoke(ledger, move |svc| {
                    let account = updated.clone();
                    async move { svc.save_account(&account).await }.boxed()
                }),
            )
            .with_compensation(invoke(ledger, move |svc| {
                let account = snapshot.clone();
                async move { svc.save_account(&account).await }.boxed()
            })),
        ],
    )
}
