//! Account persistence contract.
//!
//! The document store is the system of record for accounts; the backend is
//! its only writer. Consistency for activation and profile updates is
//! achieved entirely through conditional writes ("succeed iff the stored
//! document still matches what we read"), never through cross-request
//! locking; the predicate is the load-bearing invariant, independent of
//! the storage engine behind it.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

/// A stored account. `email` is the stable identity key.
///
/// Invariant: `is_active == true ⇔ activation_token == None`.
#[derive(Clone)]
pub struct Account {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub creation: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub activation_token: Option<String>,
}

// Neither the hash nor the activation token belongs in logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("creation", &self.creation)
            .field("last_update", &self.last_update)
            .field("permissions", &self.permissions)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// The safe projection of an account returned by the read endpoints and
/// accepted by the profile update endpoint. Never carries the hash or the
/// activation token.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub creation: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub permissions: Vec<String>,
    pub is_active: bool,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            creation: account.creation,
            last_update: account.last_update,
            permissions: account.permissions.clone(),
            is_active: account.is_active,
        }
    }
}

/// Outcome when inserting a new account.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// The email is already taken; surfaced as a plain save failure.
    Conflict,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; `Conflict` when the email already exists.
    async fn insert(&self, account: Account) -> Result<InsertOutcome>;

    /// Fetch an account by email.
    async fn find(&self, email: &str) -> Result<Option<Account>>;

    /// Compare-and-swap activation. The write succeeds iff, at write time,
    /// the stored document still has `is_active = false`, the same
    /// `last_update` that was read, and the same `activation_token`; it
    /// then activates the account, clears the token, and bumps
    /// `last_update`. A failed predicate is a plain `false`, not an error:
    /// under two concurrent attempts exactly one may win.
    async fn activate(
        &self,
        email: &str,
        last_update: DateTime<Utc>,
        activation_token: &str,
    ) -> Result<bool>;

    /// Compare-and-swap profile update keyed on `(email, last_update)`;
    /// rewrites first/last name and bumps `last_update`.
    async fn update_profile(&self, update: &AccountSummary) -> Result<bool>;

    /// Delete by email; `false` when nothing was deleted.
    async fn delete(&self, email: &str) -> Result<bool>;
}
