use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{AccountId, ConnectedAccountId};
use domain::MerchantAccount;
use tokio::sync::RwLock;

use crate::store::{Ledger, require_assigned};
use crate::{LedgerError, Result};

#[derive(Debug, Default)]
struct Faults {
    fail_on_create: AtomicBool,
    fail_on_save: AtomicBool,
    fail_on_deactivate: AtomicBool,
    fail_on_activate: AtomicBool,
    unavailable: AtomicBool,
}

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    accounts: BTreeMap<AccountId, MerchantAccount>,
    next_id: u64,
}

impl InMemoryLedgerState {
    fn email_taken(&self, email: &str, except: AccountId) -> bool {
        self.accounts
            .values()
            .any(|a| a.active && a.id != except && a.business_email == email)
    }

    fn get_mut(&mut self, id: AccountId) -> Result<&mut MerchantAccount> {
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("id {id}")))
    }
}

/// In-memory ledger implementation for testing and local runs.
///
/// Provides the same semantics as the PostgreSQL implementation, plus fault
/// toggles that make individual operations fail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
    faults: Arc<Faults>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored accounts, active or not.
    pub async fn account_count(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    /// Stores an account exactly as given, bypassing validation.
    ///
    /// Assigns an id if the account has none. Used to seed fixtures such as
    /// accounts with corrupted onboarding details.
    pub async fn insert_unchecked(&self, mut account: MerchantAccount) -> MerchantAccount {
        let mut state = self.state.write().await;
        if account.id.is_unassigned() {
            state.next_id += 1;
            account.id = AccountId::new(state.next_id);
        }
        state.next_id = state.next_id.max(account.id.as_u64());
        state.accounts.insert(account.id, account.clone());
        account
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.faults.fail_on_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_save(&self, fail: bool) {
        self.faults.fail_on_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_deactivate(&self, fail: bool) {
        self.faults.fail_on_deactivate.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_activate(&self, fail: bool) {
        self.faults.fail_on_activate.store(fail, Ordering::SeqCst);
    }

    /// Makes every operation, including `ping`, fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self, toggle: &AtomicBool, operation: &str) -> Result<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger is offline".to_string()));
        }
        if toggle.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable(format!("{operation} rejected")));
        }
        Ok(())
    }

    fn check_available(&self) -> Result<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_account(&self, mut account: MerchantAccount) -> Result<MerchantAccount> {
        self.check(&self.faults.fail_on_create, "create_account")?;
        account.validate_for_storage()?;

        let mut state = self.state.write().await;
        if account.active && state.email_taken(&account.business_email, AccountId::default()) {
            return Err(LedgerError::AlreadyExists(format!(
                "business email {}",
                account.business_email
            )));
        }

        state.next_id += 1;
        let now = Utc::now();
        account.id = AccountId::new(state.next_id);
        account.created_at = Some(now);
        account.updated_at = Some(now);
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn save_account(&self, account: &MerchantAccount) -> Result<()> {
        self.check(&self.faults.fail_on_save, "save_account")?;
        require_assigned(account.id)?;
        account.validate_for_storage()?;

        let mut state = self.state.write().await;
        if account.active && state.email_taken(&account.business_email, account.id) {
            return Err(LedgerError::AlreadyExists(format!(
                "business email {}",
                account.business_email
            )));
        }

        let stored = state.get_mut(account.id)?;
        let created_at = stored.created_at;
        *stored = account.clone();
        stored.created_at = created_at;
        stored.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn get_account_by_id(&self, id: AccountId) -> Result<MerchantAccount> {
        self.check_available()?;
        require_assigned(id)?;
        self.state
            .read()
            .await
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("id {id}")))
    }

    async fn deactivate_account(&self, id: AccountId) -> Result<()> {
        self.check(&self.faults.fail_on_deactivate, "deactivate_account")?;
        require_assigned(id)?;

        let mut state = self.state.write().await;
        let account = state.get_mut(id)?;
        if account.active {
            account.deactivate();
            account.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn activate_account(&self, id: AccountId) -> Result<()> {
        self.check(&self.faults.fail_on_activate, "activate_account")?;
        require_assigned(id)?;

        let mut state = self.state.write().await;
        let email = state.get_mut(id)?.business_email.clone();
        if state.email_taken(&email, id) {
            return Err(LedgerError::AlreadyExists(format!("business email {email}")));
        }

        let account = state.get_mut(id)?;
        if !account.active {
            account.activate();
            account.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn find_by_connected_account_id(
        &self,
        connected_account_id: &ConnectedAccountId,
    ) -> Result<MerchantAccount> {
        self.check_available()?;
        self.state
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.connected_account_id.as_ref() == Some(connected_account_id))
            .cloned()
            .ok_or_else(|| {
                LedgerError::NotFound(format!("connected account {connected_account_id}"))
            })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<MerchantAccount>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.active && a.business_email == email)
            .cloned())
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use common::{EmployerId, IdentityId};
    use domain::{OnboardingDetail, OnboardingState};

    use super::*;

    fn new_account(email: &str) -> MerchantAccount {
        let mut account = MerchantAccount::new("Harbor Coffee", email, EmployerId::new(5));
        account.identity_id = IdentityId::new(42);
        account.onboarding_detail = OnboardingDetail::IdentityOnboardingStarted;
        account
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let ledger = InMemoryLedger::new();

        let first = ledger.create_account(new_account("a@harbor.test")).await.unwrap();
        let second = ledger.create_account(new_account("b@harbor.test")).await.unwrap();

        assert_eq!(first.id, AccountId::new(1));
        assert_eq!(second.id, AccountId::new(2));
        assert!(first.created_at.is_some());
        assert_eq!(ledger.account_count().await, 2);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_active_email() {
        let ledger = InMemoryLedger::new();
        ledger.create_account(new_account("a@harbor.test")).await.unwrap();

        let result = ledger.create_account(new_account("a@harbor.test")).await;
        assert!(matches!(result, Err(LedgerError::AlreadyExists(_))));
        assert_eq!(ledger.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_allows_email_of_deactivated_account() {
        let ledger = InMemoryLedger::new();
        let first = ledger.create_account(new_account("a@harbor.test")).await.unwrap();
        ledger.deactivate_account(first.id).await.unwrap();

        assert!(ledger.create_account(new_account("a@harbor.test")).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_validates_account() {
        let ledger = InMemoryLedger::new();
        let mut account = new_account("a@harbor.test");
        account.identity_id = IdentityId::new(0);

        let result = ledger.create_account(account).await;
        assert!(matches!(result, Err(LedgerError::Domain(_))));
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let ledger = InMemoryLedger::new();
        let mut account = ledger.create_account(new_account("a@harbor.test")).await.unwrap();

        account.business_name = "Harbor Coffee Roasters".to_string();
        ledger.save_account(&account).await.unwrap();

        let loaded = ledger.get_account_by_id(account.id).await.unwrap();
        assert_eq!(loaded.business_name, "Harbor Coffee Roasters");
        assert_eq!(loaded.created_at, account.created_at);
    }

    #[tokio::test]
    async fn test_save_unknown_account_fails() {
        let ledger = InMemoryLedger::new();
        let mut account = new_account("a@harbor.test");
        account.id = AccountId::new(99);

        let result = ledger.save_account(&account).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_zero_id_is_invalid() {
        let ledger = InMemoryLedger::new();
        let result = ledger.get_account_by_id(AccountId::new(0)).await;
        assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_deactivate_and_activate_are_idempotent() {
        let ledger = InMemoryLedger::new();
        let account = ledger.create_account(new_account("a@harbor.test")).await.unwrap();

        ledger.deactivate_account(account.id).await.unwrap();
        ledger.deactivate_account(account.id).await.unwrap();
        let loaded = ledger.get_account_by_id(account.id).await.unwrap();
        assert!(!loaded.active);
        assert_eq!(loaded.onboarding_state, OnboardingState::PendingCompletion);

        ledger.activate_account(account.id).await.unwrap();
        ledger.activate_account(account.id).await.unwrap();
        assert!(ledger.get_account_by_id(account.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_inactive() {
        let ledger = InMemoryLedger::new();
        let account = ledger.create_account(new_account("a@harbor.test")).await.unwrap();
        assert!(ledger.find_by_email("a@harbor.test").await.unwrap().is_some());

        ledger.deactivate_account(account.id).await.unwrap();
        assert!(ledger.find_by_email("a@harbor.test").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_connected_account_id() {
        let ledger = InMemoryLedger::new();
        let mut account = ledger.create_account(new_account("a@harbor.test")).await.unwrap();
        account.connected_account_id = Some(ConnectedAccountId::new("acct_0001"));
        ledger.save_account(&account).await.unwrap();

        let found = ledger
            .find_by_connected_account_id(&ConnectedAccountId::new("acct_0001"))
            .await
            .unwrap();
        assert_eq!(found.id, account.id);

        let missing = ledger
            .find_by_connected_account_id(&ConnectedAccountId::new("acct_9999"))
            .await;
        assert!(matches!(missing, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fault_toggles() {
        let ledger = InMemoryLedger::new();
        ledger.set_fail_on_create(true);
        assert!(matches!(
            ledger.create_account(new_account("a@harbor.test")).await,
            Err(LedgerError::Unavailable(_))
        ));

        ledger.set_fail_on_create(false);
        ledger.set_unavailable(true);
        assert!(ledger.ping().await.is_err());
        ledger.set_unavailable(false);
        assert!(ledger.ping().await.is_ok());
    }
}
