//! Backend configuration and shared request state.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::activation::{ActivationMode, MailSender};
use crate::auth::keystore::SigningKeyStore;
use crate::auth::token;
use crate::backend::storage::AccountStore;

/// Fallback when the configured rotation period is below one millisecond.
pub const DEFAULT_KEY_ROTATION: Duration = Duration::from_millis(86_400_000);

#[derive(Clone, Debug)]
pub struct BackendConfig {
    activation_mode: ActivationMode,
    token_ttl_millis: i64,
    key_rotation_millis: i64,
}

impl BackendConfig {
    #[must_use]
    pub fn new(activation_mode: ActivationMode) -> Self {
        Self {
            activation_mode,
            token_ttl_millis: 28_800_000,
            key_rotation_millis: 86_400_000,
        }
    }

    #[must_use]
    pub fn with_token_ttl_millis(mut self, millis: i64) -> Self {
        self.token_ttl_millis = millis;
        self
    }

    #[must_use]
    pub fn with_key_rotation_millis(mut self, millis: i64) -> Self {
        self.key_rotation_millis = millis;
        self
    }

    #[must_use]
    pub fn activation_mode(&self) -> ActivationMode {
        self.activation_mode
    }

    /// Token lifetime with the documented sub-millisecond fallback.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        token::effective_ttl(self.token_ttl_millis)
    }

    /// Rotation period with the documented sub-millisecond fallback.
    #[must_use]
    pub fn key_rotation_period(&self) -> Duration {
        if self.key_rotation_millis < 1 {
            DEFAULT_KEY_ROTATION
        } else {
            Duration::from_millis(self.key_rotation_millis.unsigned_abs())
        }
    }
}

/// Shared state for every backend request. Cloning is cheap; the signing
/// key store is the only cross-request mutable piece, and its writer is the
/// rotation task alone.
#[derive(Clone)]
pub struct BackendState {
    store: Arc<dyn AccountStore>,
    keys: Arc<SigningKeyStore>,
    mail: Arc<dyn MailSender>,
    config: Arc<BackendConfig>,
}

impl BackendState {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        keys: Arc<SigningKeyStore>,
        mail: Arc<dyn MailSender>,
        config: BackendConfig,
    ) -> Self {
        Self {
            store,
            keys,
            mail,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn keys(&self) -> &SigningKeyStore {
        self.keys.as_ref()
    }

    #[must_use]
    pub fn mail(&self) -> &dyn MailSender {
        self.mail.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}
