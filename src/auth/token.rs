//! Compact JWS codec for access tokens (HS512).
//!
//! Tokens are `header.payload.signature` with `sub`, `iat`, `exp` and a
//! `permissions` claim copied verbatim from the account at issuance time.
//! Verification is pure: no side effects and no revocation state beyond key
//! rotation and expiry. Every defect collapses into a single [`Error`] the
//! caller treats as "not authenticated"; nothing here may escalate into a
//! hard failure on the request path.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::time::Duration;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

const TOKEN_ALG: &str = "HS512";

/// Fallback when the configured TTL is missing or below one millisecond.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_millis(28_800_000);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs512() -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by an access token. Immutable once issued; the permission
/// list is a snapshot and stays stale until the next login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub permissions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid key length")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("missing or blank subject")]
    MissingSubject,
    #[error("token expired")]
    Expired,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Issue an HS512-signed token for `subject` with the given permission
/// snapshot. `iat` is `now`, `exp` is `now + ttl` (unix seconds).
///
/// # Errors
///
/// Returns an error if the key length is rejected by HMAC or the claims
/// cannot be encoded.
pub fn issue(
    key: &[u8],
    subject: &str,
    permissions: &[String],
    now_unix_seconds: i64,
    ttl: Duration,
) -> Result<String, Error> {
    let claims = AccessClaims {
        sub: subject.to_string(),
        iat: now_unix_seconds,
        exp: now_unix_seconds.saturating_add(ttl.as_secs().try_into().unwrap_or(i64::MAX)),
        permissions: permissions.to_vec(),
    };

    let header_b64 = b64e_json(&TokenHeader::hs512())?;
    let claims_b64 = b64e_json(&claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha512::new_from_slice(key).map_err(|_| Error::InvalidKey)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a token against `key` at `now` and return its decoded claims.
///
/// Fails closed: malformed structure, invalid base64/json, a foreign `alg`,
/// a bad signature, a missing or blank subject, and `now >= exp` are all
/// errors. Claims are only decoded after the signature checks out.
///
/// # Errors
///
/// Returns the defect as an [`Error`]; callers collapse every variant into
/// "not authenticated".
pub fn verify(key: &[u8], token: &str, now_unix_seconds: i64) -> Result<AccessClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != TOKEN_ALG {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = HmacSha512::new_from_slice(key).map_err(|_| Error::InvalidKey)?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: AccessClaims = b64d_json(claims_b64)?;
    if claims.sub.trim().is_empty() {
        return Err(Error::MissingSubject);
    }
    if now_unix_seconds >= claims.exp {
        return Err(Error::Expired);
    }

    Ok(claims)
}

/// Apply the documented TTL fallback: values below one millisecond mean the
/// configuration is unusable and the 8 hour default applies.
#[must_use]
pub fn effective_ttl(configured_millis: i64) -> Duration {
    if configured_millis < 1 {
        DEFAULT_TOKEN_TTL
    } else {
        Duration::from_millis(configured_millis.unsigned_abs())
    }
}
