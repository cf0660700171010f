//! Backend route handlers.

pub mod health;
pub mod login;
pub mod register;
pub mod users;

use crate::auth::validate;
use crate::backend::storage::Account;

/// Sanity-check a document read back from the store before trusting it.
/// A violation means the stored entity is corrupt; callers surface a
/// generic 500, never the reason.
pub(crate) fn validate_stored_account(account: &Account) -> Result<(), String> {
    validate::validate_email(&account.email)?;
    validate::validate_name(&account.first_name, "First")?;
    validate::validate_name(&account.last_name, "Last")?;
    validate::validate_timestamp(account.creation, "Creation")?;
    validate::validate_timestamp(account.last_update, "LastUpdate")?;
    validate::validate_permissions(&account.permissions)?;

    if account.is_active && account.activation_token.is_some() {
        return Err("Activation token is present, but the account is already active.".to_string());
    }
    if !account.is_active && account.activation_token.is_none() {
        return Err("Activation token is missing, but the account is not active.".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_stored_account;
    use crate::backend::storage::Account;
    use chrono::Utc;

    fn account() -> Account {
        let now = Utc::now();
        Account {
            email: "a@bb.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            creation: now,
            last_update: now,
            permissions: vec!["accounts:read".to_string()],
            is_active: true,
            activation_token: None,
        }
    }

    #[test]
    fn accepts_consistent_account() {
        assert_eq!(validate_stored_account(&account()), Ok(()));
    }

    #[test]
    fn rejects_violated_activation_invariant() {
        let mut active_with_token = account();
        active_with_token.activation_token = Some("token".to_string());
        assert!(validate_stored_account(&active_with_token).is_err());

        let mut inactive_without_token = account();
        inactive_without_token.is_active = false;
        assert!(validate_stored_account(&inactive_without_token).is_err());
    }

    #[test]
    fn rejects_invalid_fields() {
        let mut bad_email = account();
        bad_email.email = "nope".to_string();
        assert!(validate_stored_account(&bad_email).is_err());

        let mut bad_permissions = account();
        bad_permissions.permissions = vec![" ".to_string()];
        assert!(validate_stored_account(&bad_permissions).is_err());
    }
}
