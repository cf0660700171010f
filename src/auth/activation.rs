//! Account activation: modes, one-time tokens, and out-of-band delivery.
//!
//! Registration decides up front whether the account is born active
//! (`none`) or inactive with a fresh single-use activation token that a
//! delivery step hands to the user out-of-band (`email`, or `test` which
//! only logs it). The activation itself happens lazily during login via the
//! store's compare-and-swap; this module only produces the token and ships
//! it.

use anyhow::{Context, Result};
use base64ct::{Base64, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// How a freshly registered account gets activated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationMode {
    /// Accounts are created already active, no token involved.
    None,
    /// Token is delivered through the configured mail sender.
    Email,
    /// Token is only logged; for integration environments.
    Test,
}

impl ActivationMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Email => "email",
            Self::Test => "test",
        }
    }
}

impl FromStr for ActivationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "email" => Ok(Self::Email),
            "test" => Ok(Self::Test),
            other => Err(format!("invalid activation mode: {other}")),
        }
    }
}

impl fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a one-time activation token: 64 random bytes, standard base64.
///
/// Any sufficiently random source would do; the width matches the signing
/// key material for construction convenience only.
///
/// # Errors
/// Returns an error if the OS RNG fails to produce bytes.
pub fn generate_activation_token() -> Result<String> {
    let mut bytes = [0u8; 64];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate activation token")?;
    Ok(Base64::encode_string(&bytes))
}

/// Out-of-band delivery seam for activation tokens.
pub trait MailSender: Send + Sync {
    /// Deliver a message or return an error so registration can report it.
    ///
    /// # Errors
    /// Returns an error when the message could not be handed off.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Local dev sender that logs instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailSender;

impl MailSender for LogMailSender {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(to_email = %to, subject = %subject, body = %body, "mail send stub");
        Ok(())
    }
}

/// What registration decided for a new account: active or not, and the
/// token to persist alongside it.
#[derive(Debug)]
pub struct ConfirmRegistration {
    mode: ActivationMode,
    token: Option<String>,
}

impl ConfirmRegistration {
    /// Build the confirmation for one registration under `mode`.
    ///
    /// # Errors
    /// Returns an error if token generation fails.
    pub fn new(mode: ActivationMode) -> Result<Self> {
        let token = match mode {
            ActivationMode::None => None,
            ActivationMode::Email | ActivationMode::Test => Some(generate_activation_token()?),
        };
        Ok(Self { mode, token })
    }

    /// Whether the account starts out active.
    #[must_use]
    pub fn account_starts_active(&self) -> bool {
        self.token.is_none()
    }

    /// The token to persist, present iff the account starts inactive.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Hand the token to the user out-of-band.
    ///
    /// # Errors
    /// Returns an error when delivery fails; the caller decides whether the
    /// registration still counts.
    pub fn send_confirmation(&self, mail: &dyn MailSender, user_email: &str) -> Result<()> {
        match (self.mode, self.token.as_deref()) {
            (ActivationMode::Email, Some(token)) => mail.send(
                user_email,
                "Confirm registration",
                &format!("Insert this activation token in the next login: {token}"),
            ),
            (ActivationMode::Test, Some(token)) => {
                info!(to_email = %user_email, activation_token = %token, "test activation token");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
