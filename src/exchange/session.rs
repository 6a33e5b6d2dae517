// src/exchange/session.rs
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::account::AccountSnapshot;
use crate::domain::errors::ExchangeResult;

/// Where connectors keep account state between sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Saved state for `account`, if any
    async fn load(&self, account: &str) -> ExchangeResult<Option<AccountSnapshot>>;

    async fn save(&self, snapshot: AccountSnapshot) -> ExchangeResult<()>;
}

/// Session store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    snapshots: Mutex<HashMap<String, AccountSnapshot>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, account: &str) -> ExchangeResult<Option<AccountSnapshot>> {
        Ok(self.snapshots.lock().await.get(account).cloned())
    }

    async fn save(&self, snapshot: AccountSnapshot) -> ExchangeResult<()> {
        log::debug!("Saving session for account {}", snapshot.name);
        self.snapshots
            .lock()
            .await
            .insert(snapshot.name.clone(), snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Account;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn saved_snapshot_is_loaded_by_name() {
        let store = MemorySessionStore::new();
        let account = Account::new("paper", dec!(250));

        assert_eq!(store.load("paper").await.unwrap(), None);

        store.save(account.snapshot()).await.unwrap();

        let loaded = store.load("paper").await.unwrap().unwrap();
        assert_eq!(loaded.balance, Some(dec!(250)));
        assert_eq!(store.load("live").await.unwrap(), None);
    }
}
