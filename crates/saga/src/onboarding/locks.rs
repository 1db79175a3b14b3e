//! Per-account mutual exclusion for onboarding operations.

use std::collections::HashMap;
use std::sync::Arc;

use common::AccountId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-account locks.
///
/// Holding the guard returned by [`lock`](AccountLocks::lock) serializes
/// every saga touching that account. Different accounts never contend.
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    locks: Arc<Mutex<HashMap<AccountId, Arc<Mutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`.
    pub async fn lock(&self, id: AccountId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody holds or waits on.
            locks.retain(|key, lock| *key == id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of accounts with a live lock entry.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
