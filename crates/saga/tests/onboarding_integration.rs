//! Integration tests for the merchant onboarding sagas.

use std::sync::Arc;
use std::time::Duration;

use common::{AccountId, ConnectedAccountId, EmployerId, IdentityId};
use domain::{MerchantAccount, OnboardingDetail, OnboardingState};
use ledger::{InMemoryLedger, Ledger, LedgerError};
use saga::{
    AccountChanges, ConnectedAccountStatus, IdentityCall, InMemoryIdentityService,
    InMemoryPaymentProcessor, MerchantOnboarding, SagaContext, SagaCoordinator, SagaError,
};

type TestOnboarding =
    MerchantOnboarding<InMemoryIdentityService, InMemoryLedger, InMemoryPaymentProcessor>;

const REFRESH_BASE: &str = "https://merchants.test/onboarding/refresh";
const RETURN_BASE: &str = "https://merchants.test/onboarding/return";

struct TestHarness {
    onboarding: TestOnboarding,
    identity: InMemoryIdentityService,
    ledger: InMemoryLedger,
    payments: InMemoryPaymentProcessor,
}

impl TestHarness {
    fn new() -> Self {
        let identity = InMemoryIdentityService::new();
        let ledger = InMemoryLedger::new();
        let payments = InMemoryPaymentProcessor::new();

        let onboarding = MerchantOnboarding::new(
            Arc::new(identity.clone()),
            Arc::new(ledger.clone()),
            Arc::new(payments.clone()),
            SagaCoordinator::new(),
        );

        Self {
            onboarding,
            identity,
            ledger,
            payments,
        }
    }

    async fn create(&self, email: &str) -> MerchantAccount {
        self.onboarding
            .create_merchant_account(&SagaContext::new(), new_account(email), "hunter2")
            .await
            .unwrap()
    }
}

fn new_account(email: &str) -> MerchantAccount {
    MerchantAccount::new("Harbor Coffee", email, EmployerId::new(7))
}

fn saga_failure(err: SagaError) -> saga::SagaFailure {
    match err {
        SagaError::Failed(failure) => *failure,
        other => panic!("expected saga failure, got {other:?}"),
    }
}

// -- create -----------------------------------------------------------------

#[tokio::test]
async fn test_create_merchant_account() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;

    assert_eq!(account.id, AccountId::new(1));
    assert_eq!(account.identity_id, IdentityId::new(1));
    assert_eq!(account.onboarding_detail, OnboardingDetail::IdentityOnboardingStarted);
    assert_eq!(account.onboarding_state, OnboardingState::PendingCompletion);
    assert!(account.active);

    let login = h.identity.account(account.identity_id).await.unwrap();
    assert_eq!(login.email, "owner@harbor.test");
    assert!(!login.locked);
    assert_eq!(h.ledger.account_count().await, 1);
}

#[tokio::test]
async fn test_create_duplicate_email_locks_identity_account() {
    let h = TestHarness::new();
    // Existing active account held by a different identity login.
    let mut existing = new_account("owner@harbor.test");
    existing.identity_id = IdentityId::new(5);
    h.ledger.insert_unchecked(existing).await;

    h.identity.force_next_id(IdentityId::new(42)).await;
    let err = h
        .onboarding
        .create_merchant_account(&SagaContext::new(), new_account("owner@harbor.test"), "pw")
        .await
        .unwrap_err();

    let failure = saga_failure(err);
    assert_eq!(failure.failed_step, "create_ledger_account");
    assert!(matches!(
        failure.error,
        SagaError::Ledger(LedgerError::AlreadyExists(_))
    ));
    assert!(failure.compensation_errors.is_empty());
    assert_eq!(failure.compensated, vec!["create_identity_account"]);

    let calls = h.identity.calls().await;
    assert_eq!(calls.last(), Some(&IdentityCall::LockAccount(IdentityId::new(42))));
    assert!(h.identity.account(IdentityId::new(42)).await.unwrap().locked);
    assert_eq!(h.ledger.account_count().await, 1);
}

#[tokio::test]
async fn test_email_availability_check_touches_only_the_ledger() {
    let h = TestHarness::new();
    let ctx = SagaContext::new();
    h.onboarding
        .ensure_email_available(&ctx, "owner@harbor.test")
        .await
        .unwrap();

    h.create("owner@harbor.test").await;
    let calls_before = h.identity.calls().await.len();

    let err = h
        .onboarding
        .ensure_email_available(&ctx, "owner@harbor.test")
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::Ledger(LedgerError::AlreadyExists(_))));
    assert!(err.is_conflict());
    assert_eq!(h.identity.calls().await.len(), calls_before);
}

#[tokio::test]
async fn test_create_reports_failed_lock_compensation() {
    let h = TestHarness::new();
    h.ledger.set_fail_on_create(true);
    h.identity.set_fail_on_lock(true);

    let err = h
        .onboarding
        .create_merchant_account(&SagaContext::new(), new_account("owner@harbor.test"), "pw")
        .await
        .unwrap_err();

    let failure = saga_failure(err);
    assert!(failure.is_inconsistent());
    assert_eq!(failure.compensation_errors.len(), 1);
    assert_eq!(failure.compensation_errors[0].step, "create_identity_account");
}

#[tokio::test]
async fn test_create_identity_failure_runs_nothing_else() {
    let h = TestHarness::new();
    h.identity.set_fail_on_create(true);

    let err = h
        .onboarding
        .create_merchant_account(&SagaContext::new(), new_account("owner@harbor.test"), "pw")
        .await
        .unwrap_err();

    let failure = saga_failure(err);
    assert_eq!(failure.failed_step, "create_identity_account");
    assert!(failure.compensated.is_empty());
    assert_eq!(h.ledger.account_count().await, 0);
}

#[tokio::test]
async fn test_create_rejects_invalid_input_before_any_step() {
    let h = TestHarness::new();

    let err = h
        .onboarding
        .create_merchant_account(&SagaContext::new(), new_account(""), "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::Validation(_)));

    let err = h
        .onboarding
        .create_merchant_account(&SagaContext::new(), new_account("a@harbor.test"), "")
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::Validation(_)));

    assert!(h.identity.calls().await.is_empty());
}

// -- deactivate / reactivate ------------------------------------------------

#[tokio::test]
async fn test_deactivate_with_zero_id_executes_nothing() {
    let h = TestHarness::new();
    let err = h
        .onboarding
        .deactivate_merchant_account(&SagaContext::new(), AccountId::new(0))
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::Validation(_)));
    assert!(h.identity.calls().await.is_empty());
}

#[tokio::test]
async fn test_deactivate_then_reactivate() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;

    h.onboarding
        .deactivate_merchant_account(&SagaContext::new(), account.id)
        .await
        .unwrap();
    let stored = h.ledger.get_account_by_id(account.id).await.unwrap();
    assert!(!stored.active);
    assert!(h.identity.account(account.identity_id).await.unwrap().locked);

    let reactivated = h
        .onboarding
        .reactivate_merchant_account(&SagaContext::new(), account.id)
        .await
        .unwrap();
    assert!(reactivated.active);
    assert!(!h.identity.account(account.identity_id).await.unwrap().locked);
}

#[tokio::test]
async fn test_deactivate_ledger_failure_unlocks_identity() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;
    h.ledger.set_fail_on_deactivate(true);

    let err = h
        .onboarding
        .deactivate_merchant_account(&SagaContext::new(), account.id)
        .await
        .unwrap_err();

    let failure = saga_failure(err);
    assert_eq!(failure.failed_step, "deactivate_ledger_account");
    assert!(!failure.is_inconsistent());

    let calls = h.identity.calls().await;
    assert_eq!(
        calls[calls.len() - 2..],
        [
            IdentityCall::LockAccount(account.identity_id),
            IdentityCall::UnlockAccount(account.identity_id),
        ]
    );
    assert!(!h.identity.account(account.identity_id).await.unwrap().locked);
    assert!(h.ledger.get_account_by_id(account.id).await.unwrap().active);
}

#[tokio::test]
async fn test_reactivate_active_account_is_a_no_op() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;
    let calls_before = h.identity.calls().await.len();

    let result = h
        .onboarding
        .reactivate_merchant_account(&SagaContext::new(), account.id)
        .await
        .unwrap();

    assert!(result.active);
    assert_eq!(h.identity.calls().await.len(), calls_before);
}

#[tokio::test]
async fn test_reactivate_ledger_failure_relocks_identity() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;
    h.onboarding
        .deactivate_merchant_account(&SagaContext::new(), account.id)
        .await
        .unwrap();
    h.ledger.set_fail_on_activate(true);

    let err = h
        .onboarding
        .reactivate_merchant_account(&SagaContext::new(), account.id)
        .await
        .unwrap_err();

    let failure = saga_failure(err);
    assert_eq!(failure.failed_step, "activate_ledger_account");
    assert_eq!(failure.compensated, vec!["unlock_identity_account"]);
    assert!(h.identity.account(account.identity_id).await.unwrap().locked);
}

// -- email update -----------------------------------------------------------

#[tokio::test]
async fn test_update_email() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;

    let updated = h
        .onboarding
        .update_merchant_account_email(&SagaContext::new(), account.id, "new@harbor.test")
        .await
        .unwrap();

    assert_eq!(updated.business_email, "new@harbor.test");
    assert_eq!(
        h.identity.account(account.identity_id).await.unwrap().email,
        "new@harbor.test"
    );
}

#[tokio::test]
async fn test_update_email_ledger_failure_restores_pre_saga_state() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;
    let before = h.ledger.get_account_by_id(account.id).await.unwrap();
    h.ledger.set_fail_on_save(true);

    let err = h
        .onboarding
        .update_merchant_account_email(&SagaContext::new(), account.id, "new@harbor.test")
        .await
        .unwrap_err();

    let failure = saga_failure(err);
    assert_eq!(failure.failed_step, "save_ledger_account");
    assert!(!failure.is_inconsistent());

    let calls = h.identity.calls().await;
    assert_eq!(
        calls[calls.len() - 2..],
        [
            IdentityCall::UpdateEmail {
                id: account.identity_id,
                email: "new@harbor.test".to_string()
            },
            IdentityCall::UpdateEmail {
                id: account.identity_id,
                email: "owner@harbor.test".to_string()
            },
        ]
    );
    assert_eq!(
        h.identity.account(account.identity_id).await.unwrap().email,
        "owner@harbor.test"
    );
    assert_eq!(h.ledger.get_account_by_id(account.id).await.unwrap(), before);
}

#[tokio::test]
async fn test_update_without_email_change_skips_identity() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;
    let calls_before = h.identity.calls().await.len();

    let updated = h
        .onboarding
        .update_merchant_account(
            &SagaContext::new(),
            account.id,
            AccountChanges {
                business_name: Some("Harbor Roasters".to_string()),
                ..AccountChanges::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.business_name, "Harbor Roasters");
    assert_eq!(h.identity.calls().await.len(), calls_before);
}

#[tokio::test]
async fn test_update_email_rejects_malformed_email() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;

    let err = h
        .onboarding
        .update_merchant_account_email(&SagaContext::new(), account.id, "not-an-email")
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::Validation(_)));
}

// -- payment onboarding -----------------------------------------------------

#[tokio::test]
async fn test_payment_onboarding_flow() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;

    let link = h
        .onboarding
        .start_payment_onboarding(&SagaContext::new(), account.id, REFRESH_BASE, RETURN_BASE)
        .await
        .unwrap();
    assert_eq!(link.connected_account_id, ConnectedAccountId::new("acct_0001"));
    assert!(link.url.contains(&format!("{REFRESH_BASE}/acct_0001")));
    assert!(link.url.contains(&format!("{RETURN_BASE}/acct_0001")));

    let stored = h.ledger.get_account_by_id(account.id).await.unwrap();
    assert_eq!(stored.onboarding_detail, OnboardingDetail::PaymentOnboardingStarted);
    assert_eq!(stored.connected_account_id, Some(link.connected_account_id.clone()));

    // Merchant has not finished the hosted form yet.
    let pending = h
        .onboarding
        .complete_payment_onboarding(&SagaContext::new(), &link.connected_account_id)
        .await
        .unwrap();
    assert_eq!(pending.onboarding_detail, OnboardingDetail::PaymentOnboardingStarted);

    h.payments
        .set_status(
            &link.connected_account_id,
            ConnectedAccountStatus {
                charges_enabled: true,
                details_submitted: true,
            },
        )
        .await
        .unwrap();
    let completed = h
        .onboarding
        .complete_payment_onboarding(&SagaContext::new(), &link.connected_account_id)
        .await
        .unwrap();
    assert_eq!(completed.onboarding_detail, OnboardingDetail::PaymentOnboardingCompleted);
    assert_eq!(completed.onboarding_state, OnboardingState::PendingCompletion);
}

#[tokio::test]
async fn test_start_payment_onboarding_reuses_connected_account() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;
    let ctx = SagaContext::new();

    let first = h
        .onboarding
        .start_payment_onboarding(&ctx, account.id, REFRESH_BASE, RETURN_BASE)
        .await
        .unwrap();
    let second = h
        .onboarding
        .start_payment_onboarding(&ctx, account.id, REFRESH_BASE, RETURN_BASE)
        .await
        .unwrap();

    assert_eq!(first.connected_account_id, second.connected_account_id);
    assert_eq!(h.payments.account_count().await, 1);
}

#[tokio::test]
async fn test_refresh_link_for_unknown_connected_account() {
    let h = TestHarness::new();
    let err = h
        .onboarding
        .refresh_onboarding_link(
            &SagaContext::new(),
            &ConnectedAccountId::new("acct_missing"),
            REFRESH_BASE,
            RETURN_BASE,
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_advance_onboarding_to_terminal() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;
    let ctx = SagaContext::new();

    let mut current = account;
    for _ in 0..10 {
        current = h.onboarding.advance_onboarding(&ctx, current.id).await.unwrap();
    }

    assert_eq!(current.onboarding_detail, OnboardingDetail::ComplianceOnboardingCompleted);
    assert_eq!(current.onboarding_state, OnboardingState::ActiveAndOnboarded);
}

#[tokio::test]
async fn test_advance_onboarding_resets_unrecognized_detail() {
    let h = TestHarness::new();
    let mut corrupted = new_account("owner@harbor.test");
    corrupted.identity_id = IdentityId::new(3);
    corrupted.onboarding_detail = OnboardingDetail::Unrecognized;
    let stored = h.ledger.insert_unchecked(corrupted).await;

    let advanced = h
        .onboarding
        .advance_onboarding(&SagaContext::new(), stored.id)
        .await
        .unwrap();
    assert_eq!(advanced.onboarding_detail, OnboardingDetail::NotStarted);
    assert_eq!(advanced.onboarding_state, OnboardingState::PendingCompletion);
}

// -- concurrency and cancellation --------------------------------------------

#[tokio::test]
async fn test_expired_deadline_fails_before_any_collaborator_call() {
    let h = TestHarness::new();
    let ctx = SagaContext::new().with_timeout(Duration::ZERO);

    let err = h
        .onboarding
        .create_merchant_account(&ctx, new_account("owner@harbor.test"), "pw")
        .await
        .unwrap_err();

    let failure = saga_failure(err);
    assert!(matches!(failure.error, SagaError::DeadlineExceeded));
    assert!(h.identity.calls().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_updates_to_one_account_are_serialized() {
    let h = TestHarness::new();
    let account = h.create("owner@harbor.test").await;
    let id = account.id;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let onboarding = h.onboarding.clone();
        tasks.push(tokio::spawn(async move {
            onboarding
                .update_merchant_account_email(
                    &SagaContext::new(),
                    id,
                    &format!("owner{i}@harbor.test"),
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = h.ledger.get_account_by_id(account.id).await.unwrap();
    let login = h.identity.account(account.identity_id).await.unwrap();
    assert_eq!(stored.business_email, login.email);
}
