use crate::auth::activation::{ActivationMode, LogMailSender};
use crate::auth::keystore::{self, SigningKeyStore};
use crate::backend;
use crate::backend::state::{BackendConfig, BackendState};
use crate::backend::storage::PgAccountStore;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_ttl_millis: i64,
    pub key_rotation_millis: i64,
    pub activation_mode: ActivationMode,
}

/// Execute the backend server action.
///
/// # Errors
/// Returns an error if the database is unreachable, the initial signing key
/// cannot be generated, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = BackendConfig::new(args.activation_mode)
        .with_token_ttl_millis(args.token_ttl_millis)
        .with_key_rotation_millis(args.key_rotation_millis);

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let keys = Arc::new(SigningKeyStore::new()?);
    keystore::spawn_rotation(keys.clone(), config.key_rotation_period());

    info!(
        activation_mode = %config.activation_mode(),
        "Starting backend"
    );

    let state = BackendState::new(
        Arc::new(PgAccountStore::new(pool)),
        keys,
        Arc::new(LogMailSender),
        config,
    );

    backend::new(args.port, state).await
}
