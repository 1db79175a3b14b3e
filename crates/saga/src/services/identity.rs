//! Identity service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::IdentityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors returned by the identity service.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity account not found: {0}")]
    NotFound(IdentityId),

    #[error("Identity account already exists: {0}")]
    AlreadyExists(String),

    #[error("Identity request rejected: {0}")]
    Rejected(String),

    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

/// Health snapshot reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    pub accounts: usize,
    pub locked_accounts: usize,
}

/// Authentication accounts backing merchant logins.
#[async_trait]
pub trait Identity: Send + Sync {
    /// Creates a login for `email` and returns its id.
    async fn create_account(
        &self,
        email: &str,
        secret: &str,
        locked: bool,
    ) -> Result<IdentityId, IdentityError>;

    async fn lock_account(&self, id: IdentityId) -> Result<(), IdentityError>;

    async fn unlock_account(&self, id: IdentityId) -> Result<(), IdentityError>;

    async fn update_email(&self, id: IdentityId, new_email: &str) -> Result<(), IdentityError>;

    /// Used by the startup connector to check the service is reachable.
    async fn server_stats(&self) -> Result<ServerStats, IdentityError>;
}

/// A call received by [`InMemoryIdentityService`], recorded even when a
/// fault toggle makes it fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCall {
    CreateAccount { email: String, locked: bool },
    LockAccount(IdentityId),
    UnlockAccount(IdentityId),
    UpdateEmail { id: IdentityId, email: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub email: String,
    pub locked: bool,
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_create: AtomicBool,
    fail_on_lock: AtomicBool,
    fail_on_unlock: AtomicBool,
    fail_on_update_email: AtomicBool,
    unavailable: AtomicBool,
}

#[derive(Debug, Default)]
struct InMemoryIdentityState {
    accounts: HashMap<IdentityId, IdentityRecord>,
    calls: Vec<IdentityCall>,
    next_id: u32,
    forced_next_id: Option<IdentityId>,
}

/// In-memory identity service for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityService {
    state: Arc<Mutex<InMemoryIdentityState>>,
    faults: Arc<Faults>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `create_account` return `id`. Later ids continue
    /// past it.
    pub async fn force_next_id(&self, id: IdentityId) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(id.as_u32());
        state.forced_next_id = Some(id);
    }

    /// Stores an account directly, bypassing call recording.
    pub async fn seed_account(&self, id: IdentityId, email: &str, locked: bool) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(id.as_u32());
        state.accounts.insert(
            id,
            IdentityRecord {
                email: email.to_string(),
                locked,
            },
        );
    }

    pub async fn account(&self, id: IdentityId) -> Option<IdentityRecord> {
        self.state.lock().await.accounts.get(&id).cloned()
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<IdentityCall> {
        self.state.lock().await.calls.clone()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.faults.fail_on_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_lock(&self, fail: bool) {
        self.faults.fail_on_lock.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_unlock(&self, fail: bool) {
        self.faults.fail_on_unlock.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_update_email(&self, fail: bool) {
        self.faults.fail_on_update_email.store(fail, Ordering::SeqCst);
    }

    /// Makes every operation, including `server_stats`, fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self, toggle: &AtomicBool, operation: &str) -> Result<(), IdentityError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("identity service is offline".to_string()));
        }
        if toggle.load(Ordering::SeqCst) {
            return Err(IdentityError::Rejected(format!("{operation} rejected")));
        }
        Ok(())
    }

    async fn record(&self, call: IdentityCall) {
        self.state.lock().await.calls.push(call);
    }

    async fn set_locked(&self, id: IdentityId, locked: bool) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;
        let record = state
            .accounts
            .get_mut(&id)
            .ok_or(IdentityError::NotFound(id))?;
        record.locked = locked;
        Ok(())
    }
}

#[async_trait]
impl Identity for InMemoryIdentityService {
    async fn create_account(
        &self,
        email: &str,
        secret: &str,
        locked: bool,
    ) -> Result<IdentityId, IdentityError> {
        self.record(IdentityCall::CreateAccount {
            email: email.to_string(),
            locked,
        })
        .await;
        self.check(&self.faults.fail_on_create, "create_account")?;
        if secret.is_empty() {
            return Err(IdentityError::Rejected("secret cannot be empty".to_string()));
        }

        let mut state = self.state.lock().await;

        if state.accounts.values().any(|a| a.email == email) {
            return Err(IdentityError::AlreadyExists(email.to_string()));
        }

        let id = match state.forced_next_id.take() {
            Some(id) => id,
            None => {
                state.next_id += 1;
                IdentityId::new(state.next_id)
            }
        };
        state.accounts.insert(
            id,
            IdentityRecord {
                email: email.to_string(),
                locked,
            },
        );
        Ok(id)
    }

    async fn lock_account(&self, id: IdentityId) -> Result<(), IdentityError> {
        self.record(IdentityCall::LockAccount(id)).await;
        self.check(&self.faults.fail_on_lock, "lock_account")?;
        self.set_locked(id, true).await
    }

    async fn unlock_account(&self, id: IdentityId) -> Result<(), IdentityError> {
        self.record(IdentityCall::UnlockAccount(id)).await;
        self.check(&self.faults.fail_on_unlock, "unlock_account")?;
        self.set_locked(id, false).await
    }

    async fn update_email(&self, id: IdentityId, new_email: &str) -> Result<(), IdentityError> {
        self.record(IdentityCall::UpdateEmail {
            id,
            email: new_email.to_string(),
        })
        .await;
        self.check(&self.faults.fail_on_update_email, "update_email")?;

        let mut state = self.state.lock().await;
        if state
            .accounts
            .iter()
            .any(|(other, a)| *other != id && a.email == new_email)
        {
            return Err(IdentityError::AlreadyExists(new_email.to_string()));
        }
        let record = state
            .accounts
            .get_mut(&id)
            .ok_or(IdentityError::NotFound(id))?;
        record.email = new_email.to_string();
        Ok(())
    }

    async fn server_stats(&self) -> Result<ServerStats, IdentityError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("identity service is offline".to_string()));
        }
        let state = self.state.lock().await;
        Ok(ServerStats {
            accounts: state.accounts.len(),
            locked_accounts: state.accounts.values().filter(|a| a.locked).count(),
        })
    }
}
