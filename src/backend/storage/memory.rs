//! In-memory account store.
//!
//! Implements the same conditional-write predicates as the Postgres store
//! under a single mutex, which makes it the store of choice for exercising
//! the activation race without external infrastructure.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{Account, AccountStore, AccountSummary, InsertOutcome};

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<InsertOutcome> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&account.email) {
            return Ok(InsertOutcome::Conflict);
        }
        accounts.insert(account.email.clone(), account);
        Ok(InsertOutcome::Created)
    }

    async fn find(&self, email: &str) -> Result<Option<Account>> {
        Ok(self.accounts.lock().await.get(email).cloned())
    }

    async fn activate(
        &self,
        email: &str,
        last_update: DateTime<Utc>,
        activation_token: &str,
    ) -> Result<bool> {
        let mut accounts = self.accounts.lock().await;
        let Some(account) = accounts.get_mut(email) else {
            return Ok(false);
        };

        // Same predicate as the SQL WHERE clause; evaluated under the lock.
        let predicate_holds = !account.is_active
            && account.last_update == last_update
            && account.activation_token.as_deref() == Some(activation_token);
        if !predicate_holds {
            return Ok(false);
        }

        account.is_active = true;
        account.activation_token = None;
        account.last_update = Utc::now();
        Ok(true)
    }

    async fn update_profile(&self, update: &AccountSummary) -> Result<bool> {
        let mut accounts = self.accounts.lock().await;
        let Some(account) = accounts.get_mut(&update.email) else {
            return Ok(false);
        };

        if account.last_update != update.last_update {
            return Ok(false);
        }

        account.first_name = update.first_name.clone();
        account.last_name = update.last_name.clone();
        account.last_update = Utc::now();
        Ok(true)
    }

    async fn delete(&self, email: &str) -> Result<bool> {
        Ok(self.accounts.lock().await.remove(email).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::{Account, AccountStore, InsertOutcome, MemoryAccountStore};
    use anyhow::Result;
    use chrono::Utc;
    use std::sync::Arc;

    fn inactive_account(email: &str, token: &str) -> Account {
        let now = Utc::now();
        Account {
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            creation: now,
            last_update: now,
            permissions: vec!["accounts:read".to_string()],
            is_active: false,
            activation_token: Some(token.to_string()),
        }
    }

    #[tokio::test]
    async fn insert_conflicts_on_duplicate_email() -> Result<()> {
        let store = MemoryAccountStore::new();
        let account = inactive_account("a@bb.com", "token");
        assert_eq!(store.insert(account.clone()).await?, InsertOutcome::Created);
        assert_eq!(store.insert(account).await?, InsertOutcome::Conflict);
        Ok(())
    }

    #[tokio::test]
    async fn activate_wins_once_then_predicate_fails() -> Result<()> {
        let store = MemoryAccountStore::new();
        let account = inactive_account("a@bb.com", "token");
        let last_update = account.last_update;
        store.insert(account).await?;

        assert!(store.activate("a@bb.com", last_update, "token").await?);
        let activated = store.find("a@bb.com").await?.expect("account exists");
        assert!(activated.is_active);
        assert!(activated.activation_token.is_none());
        assert!(activated.last_update > last_update);

        // Already activated: the same arguments no longer match.
        assert!(!store.activate("a@bb.com", last_update, "token").await?);
        Ok(())
    }

    #[tokio::test]
    async fn activate_with_wrong_token_never_mutates() -> Result<()> {
        let store = MemoryAccountStore::new();
        let account = inactive_account("a@bb.com", "token");
        let last_update = account.last_update;
        store.insert(account).await?;

        assert!(!store.activate("a@bb.com", last_update, "other").await?);
        let unchanged = store.find("a@bb.com").await?.expect("account exists");
        assert!(!unchanged.is_active);
        assert_eq!(unchanged.last_update, last_update);
        assert_eq!(unchanged.activation_token.as_deref(), Some("token"));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_activation_has_exactly_one_winner() -> Result<()> {
        let store = Arc::new(MemoryAccountStore::new());
        let account = inactive_account("a@bb.com", "token");
        let last_update = account.last_update;
        store.insert(account).await?;

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.activate("a@bb.com", last_update, "token").await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.activate("a@bb.com", last_update, "token").await })
        };

        let first = first.await??;
        let second = second.await??;
        assert!(first ^ second, "exactly one concurrent activation may win");
        Ok(())
    }

    #[tokio::test]
    async fn update_profile_is_a_cas_on_last_update() -> Result<()> {
        let store = MemoryAccountStore::new();
        let account = inactive_account("a@bb.com", "token");
        let last_update = account.last_update;
        store.insert(account).await?;

        let mut update = super::AccountSummary {
            email: "a@bb.com".to_string(),
            first_name: "Anna".to_string(),
            last_name: "Lee".to_string(),
            creation: last_update,
            last_update,
            permissions: vec!["accounts:read".to_string()],
            is_active: false,
        };
        assert!(store.update_profile(&update).await?);

        // Stale timestamp: the previous write bumped last_update.
        update.first_name = "Annabel".to_string();
        assert!(!store.update_profile(&update).await?);

        let stored = store.find("a@bb.com").await?.expect("account exists");
        assert_eq!(stored.first_name, "Anna");
        Ok(())
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() -> Result<()> {
        let store = MemoryAccountStore::new();
        store.insert(inactive_account("a@bb.com", "token")).await?;
        assert!(store.delete("a@bb.com").await?);
        assert!(!store.delete("a@bb.com").await?);
        Ok(())
    }
}
