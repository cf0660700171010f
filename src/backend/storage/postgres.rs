//! Postgres-backed account store.
//!
//! The optimistic writes are expressed as conditional `UPDATE` statements:
//! the `WHERE` clause is the CAS predicate and `rows_affected` tells whether
//! this caller won. See `db/sql/accounts.sql` for the schema.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::{Account, AccountStore, AccountSummary, InsertOutcome};

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert(&self, account: Account) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO accounts
                (email, password_hash, first_name, last_name, creation, last_update,
                 permissions, is_active, activation_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(account.creation)
            .bind(account.last_update)
            .bind(&account.permissions)
            .bind(account.is_active)
            .bind(&account.activation_token)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn find(&self, email: &str) -> Result<Option<Account>> {
        let query = r"
            SELECT email, password_hash, first_name, last_name, creation, last_update,
                   permissions, is_active, activation_token
            FROM accounts
            WHERE email = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account")?;

        Ok(row.map(|row| Account {
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            creation: row.get("creation"),
            last_update: row.get("last_update"),
            permissions: row.get("permissions"),
            is_active: row.get("is_active"),
            activation_token: row.get("activation_token"),
        }))
    }

    async fn activate(
        &self,
        email: &str,
        last_update: DateTime<Utc>,
        activation_token: &str,
    ) -> Result<bool> {
        // The WHERE clause is the CAS predicate; a lost race updates 0 rows.
        let query = r"
            UPDATE accounts
            SET is_active = TRUE,
                activation_token = NULL,
                last_update = NOW()
            WHERE email = $1
              AND is_active = FALSE
              AND last_update = $2
              AND activation_token = $3
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(last_update)
            .bind(activation_token)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to activate account")?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_profile(&self, update: &AccountSummary) -> Result<bool> {
        let query = r"
            UPDATE accounts
            SET first_name = $2,
                last_name = $3,
                last_update = NOW()
            WHERE email = $1
              AND last_update = $4
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&update.email)
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(update.last_update)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update account")?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, email: &str) -> Result<bool> {
        let query = "DELETE FROM accounts WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete account")?;

        Ok(result.rows_affected() == 1)
    }
}
