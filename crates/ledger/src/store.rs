use async_trait::async_trait;
use common::{AccountId, ConnectedAccountId};
use domain::MerchantAccount;

use crate::{LedgerError, Result};

/// Storage capability for merchant accounts.
///
/// Every method is a single unit of work: the implementation owns the
/// begin/commit boundary and either applies the whole change or none of it.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Stores a new account and returns it with its assigned id and timestamps.
    ///
    /// Fails with `AlreadyExists` if an active account already uses the
    /// business email.
    async fn create_account(&self, account: MerchantAccount) -> Result<MerchantAccount>;

    /// Overwrites a stored account.
    async fn save_account(&self, account: &MerchantAccount) -> Result<()>;

    /// Loads an account by id, active or not.
    async fn get_account_by_id(&self, id: AccountId) -> Result<MerchantAccount>;

    /// Marks an account inactive. Deactivating an inactive account succeeds.
    async fn deactivate_account(&self, id: AccountId) -> Result<()>;

    /// Marks an account active. Activating an active account succeeds.
    async fn activate_account(&self, id: AccountId) -> Result<()>;

    /// Loads the account linked to a payment-processor connected account.
    async fn find_by_connected_account_id(
        &self,
        connected_account_id: &ConnectedAccountId,
    ) -> Result<MerchantAccount>;

    /// Finds the active account holding the business email, if any.
    async fn find_by_email(&self, email: &str) -> Result<Option<MerchantAccount>>;

    /// Verifies the ledger is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Rejects the zero id before any storage access.
pub(crate) fn require_assigned(id: AccountId) -> Result<()> {
    if id.is_unassigned() {
        return Err(LedgerError::InvalidArgument(
            "merchant account id cannot be 0".to_string(),
        ));
    }
    Ok(())
}
