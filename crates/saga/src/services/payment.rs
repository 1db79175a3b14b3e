//! Payment processor trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::ConnectedAccountId;
use domain::MerchantAccount;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors returned by the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Connected account not found: {0}")]
    NotFound(ConnectedAccountId),

    #[error("Payment processor rejected the request: {0}")]
    Rejected(String),

    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),
}

/// Onboarding progress of a connected account as seen by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectedAccountStatus {
    pub charges_enabled: bool,
    pub details_submitted: bool,
}

/// Third-party payment processor that hosts merchant payout accounts.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates a connected account for the merchant and returns its id.
    async fn create_connected_account(
        &self,
        account: &MerchantAccount,
    ) -> Result<ConnectedAccountId, PaymentError>;

    /// Creates a hosted onboarding link the merchant follows to finish setup.
    async fn create_onboarding_link(
        &self,
        connected_account_id: &ConnectedAccountId,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, PaymentError>;

    async fn get_connected_account(
        &self,
        connected_account_id: &ConnectedAccountId,
    ) -> Result<ConnectedAccountStatus, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    accounts: HashMap<ConnectedAccountId, (String, ConnectedAccountStatus)>,
    next_id: u32,
}

/// In-memory payment processor for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<Mutex<InMemoryPaymentState>>,
    fail_on_create: Arc<AtomicBool>,
    fail_on_link: Arc<AtomicBool>,
}

impl InMemoryPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_link(&self, fail: bool) {
        self.fail_on_link.store(fail, Ordering::SeqCst);
    }

    /// Records that the merchant finished the hosted onboarding form.
    pub async fn set_status(
        &self,
        connected_account_id: &ConnectedAccountId,
        status: ConnectedAccountStatus,
    ) -> Result<(), PaymentError> {
        let mut state = self.state.lock().await;
        let entry = state
            .accounts
            .get_mut(connected_account_id)
            .ok_or_else(|| PaymentError::NotFound(connected_account_id.clone()))?;
        entry.1 = status;
        Ok(())
    }

    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn create_connected_account(
        &self,
        account: &MerchantAccount,
    ) -> Result<ConnectedAccountId, PaymentError> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected("account creation declined".to_string()));
        }

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = ConnectedAccountId::new(format!("acct_{:04}", state.next_id));
        state.accounts.insert(
            id.clone(),
            (account.business_email.clone(), ConnectedAccountStatus::default()),
        );
        Ok(id)
    }

    async fn create_onboarding_link(
        &self,
        connected_account_id: &ConnectedAccountId,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, PaymentError> {
        if self.fail_on_link.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected("link creation declined".to_string()));
        }

        let state = self.state.lock().await;
        if !state.accounts.contains_key(connected_account_id) {
            return Err(PaymentError::NotFound(connected_account_id.clone()));
        }
        Ok(format!(
            "https://connect.payments.test/setup/{connected_account_id}?refresh_url={refresh_url}&return_url={return_url}"
        ))
    }

    async fn get_connected_account(
        &self,
        connected_account_id: &ConnectedAccountId,
    ) -> Result<ConnectedAccountStatus, PaymentError> {
        self.state
            .lock()
            .await
            .accounts
            .get(connected_account_id)
            .map(|(_, status)| *status)
            .ok_or_else(|| PaymentError::NotFound(connected_account_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use common::EmployerId;

    use super::*;

    fn merchant() -> MerchantAccount {
        MerchantAccount::new("Harbor Coffee", "a@harbor.test", EmployerId::new(1))
    }

    #[tokio::test]
    async fn test_sequential_connected_account_ids() {
        let processor = InMemoryPaymentProcessor::new();
        let a = processor.create_connected_account(&merchant()).await.unwrap();
        let b = processor.create_connected_account(&merchant()).await.unwrap();
        assert_eq!(a.as_str(), "acct_0001");
        assert_eq!(b.as_str(), "acct_0002");
        assert_eq!(processor.account_count().await, 2);
    }

    #[tokio::test]
    async fn test_link_embeds_urls() {
        let processor = InMemoryPaymentProcessor::new();
        let id = processor.create_connected_account(&merchant()).await.unwrap();
        let link = processor
            .create_onboarding_link(&id, "https://m.test/refresh/acct_0001", "https://m.test/return/acct_0001")
            .await
            .unwrap();
        assert!(link.contains("acct_0001"));
        assert!(link.contains("refresh_url=https://m.test/refresh/acct_0001"));
    }

    #[tokio::test]
    async fn test_status_defaults_to_incomplete() {
        let processor = InMemoryPaymentProcessor::new();
        let id = processor.create_connected_account(&merchant()).await.unwrap();
        let status = processor.get_connected_account(&id).await.unwrap();
        assert!(!status.details_submitted);

        processor
            .set_status(
                &id,
                ConnectedAccountStatus {
                    charges_enabled: true,
                    details_submitted: true,
                },
            )
            .await
            .unwrap();
        assert!(processor.get_connected_account(&id).await.unwrap().details_submitted);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let processor = InMemoryPaymentProcessor::new();
        let missing = ConnectedAccountId::new("acct_9999");
        assert!(matches!(
            processor.get_connected_account(&missing).await,
            Err(PaymentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let processor = InMemoryPaymentProcessor::new();
        processor.set_fail_on_create(true);
        assert!(processor.create_connected_account(&merchant()).await.is_err());
        assert_eq!(processor.account_count().await, 0);
    }
}
