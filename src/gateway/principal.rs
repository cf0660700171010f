//! Session-bound principal wrapping a bearer token.
//!
//! The gateway never verifies tokens (the backend is the verifier), but it
//! needs the subject to key the session registry, so it reads `sub` straight
//! out of the JWS payload. The principal exclusively owns the token for the
//! session's lifetime; nothing else may read or cache it.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrincipalError {
    #[error("token is blank")]
    BlankToken,
    #[error("cannot find two dots in the token")]
    TokenFormat,
    #[error("invalid base64url payload")]
    Base64,
    #[error("invalid payload json")]
    Json,
    #[error("subject is missing or blank")]
    MissingSubject,
}

/// A bearer token plus the subject extracted from its payload.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPrincipal {
    token: String,
    subject: String,
}

impl TokenPrincipal {
    /// Wrap an issued token, reading the subject from the payload segment.
    ///
    /// # Errors
    /// Returns an error when the token is not a plausible compact JWS with
    /// a non-blank textual `sub` claim.
    pub fn from_token(token: String) -> Result<Self, PrincipalError> {
        if token.trim().is_empty() {
            return Err(PrincipalError::BlankToken);
        }

        let mut dots = token.match_indices('.');
        let first = dots.next().ok_or(PrincipalError::TokenFormat)?.0;
        let second = dots.next().ok_or(PrincipalError::TokenFormat)?.0;

        let payload = Base64UrlUnpadded::decode_vec(&token[first + 1..second])
            .map_err(|_| PrincipalError::Base64)?;
        let payload: Value =
            serde_json::from_slice(&payload).map_err(|_| PrincipalError::Json)?;

        let subject = payload
            .get("sub")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|sub| !sub.is_empty())
            .ok_or(PrincipalError::MissingSubject)?
            .to_string();

        Ok(Self { token, subject })
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

// The token never lands in logs.
impl fmt::Debug for TokenPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPrincipal")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}
