//! In-memory signing key store with timer-driven rotation.
//!
//! Exactly one HMAC-SHA-512 key is current at any instant. The rotation task
//! is the only writer; every issuance and verification reads the current key.
//! Rotating the key deliberately invalidates all tokens signed with the
//! superseded key, bounding token lifetime even if a token's own expiry were
//! misconfigured.

use anyhow::{Context, Result};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info};

/// HMAC-SHA-512 wants a key at least as wide as its output.
const KEY_LEN: usize = 64;

/// An opaque symmetric signing key. No expiry is stored; lifetime is
/// enforced by the rotation cadence alone.
pub struct SigningKey([u8; KEY_LEN]);

impl SigningKey {
    /// Generate a fresh random key from the OS RNG.
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails to produce bytes.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate signing key")?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Key material stays out of logs.
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Holds the current signing key behind a single-writer/many-reader lock.
///
/// The scheduled rotation task is the only writer, so readers always observe
/// either the old key or the new one, never a partially built value.
#[derive(Debug)]
pub struct SigningKeyStore {
    current: RwLock<Arc<SigningKey>>,
}

impl SigningKeyStore {
    /// Create the store with an initial key generated at process start.
    ///
    /// # Errors
    /// Returns an error if the initial key cannot be generated; startup
    /// must not proceed keyless.
    pub fn new() -> Result<Self> {
        Ok(Self {
            current: RwLock::new(Arc::new(SigningKey::generate()?)),
        })
    }

    /// The current key. Cheap enough to call on every request.
    #[must_use]
    pub fn current(&self) -> Arc<SigningKey> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the current key.
    pub fn publish(&self, key: SigningKey) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(key);
    }

    /// Generate and publish a fresh key. If generation fails the store keeps
    /// serving the previous key rather than going keyless.
    pub fn rotate(&self) {
        match SigningKey::generate() {
            Ok(key) => {
                self.publish(key);
                info!("New signing key generated");
            }
            Err(err) => {
                error!("Signing key rotation failed, keeping previous key: {err}");
            }
        }
    }
}

/// Spawn the rotation task: a single periodic writer at a fixed period.
pub fn spawn_rotation(store: Arc<SigningKeyStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(period).await;
            store.rotate();
        }
    })
}
