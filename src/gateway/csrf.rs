//! Double-submit CSRF tokens with XOR masking.
//!
//! Each session owns one raw CSRF token. Whenever the token is echoed to
//! the client it is XOR-masked with a fresh random pad (pad, then pad XOR
//! token) so the value on the wire changes every response and cannot be
//! recovered through a compression side channel. Clients may submit either
//! the masked form or the raw token; validation unmasks before the
//! constant-time comparison.

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

const TOKEN_LEN: usize = 32;

/// Cookie half of the double submit. Readable by the SPA, hence never
/// `HttpOnly`.
pub const CSRF_COOKIE_NAME: &str = "XSRF-TOKEN";

/// Generate a raw per-session CSRF token.
///
/// # Errors
/// Returns an error if the OS RNG fails to produce bytes.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate csrf token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Mask a raw token for echoing: base64url(pad, then pad XOR token) with a
/// fresh random pad per call.
///
/// # Errors
/// Returns an error if the OS RNG fails to produce the pad.
pub fn mask(token: &str) -> Result<String> {
    let token_bytes = token.as_bytes();
    let mut pad = vec![0u8; token_bytes.len()];
    OsRng
        .try_fill_bytes(&mut pad)
        .context("failed to generate csrf mask")?;

    let mut out = pad.clone();
    out.extend(pad.iter().zip(token_bytes).map(|(p, t)| p ^ t));
    Ok(Base64UrlUnpadded::encode_string(&out))
}

/// Undo [`mask`]. `None` when the value is not a well-formed masked token.
#[must_use]
pub fn unmask(masked: &str) -> Option<String> {
    let bytes = Base64UrlUnpadded::decode_vec(masked).ok()?;
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return None;
    }
    let (pad, masked_token) = bytes.split_at(bytes.len() / 2);
    let token: Vec<u8> = pad
        .iter()
        .zip(masked_token)
        .map(|(p, m)| p ^ m)
        .collect();
    String::from_utf8(token).ok()
}

/// Compare a presented value (raw or masked) against the session's token.
#[must_use]
pub fn matches(expected: &str, presented: &str) -> bool {
    let raw_match: bool = presented
        .as_bytes()
        .ct_eq(expected.as_bytes())
        .into();
    if raw_match {
        return true;
    }

    unmask(presented)
        .is_some_and(|unmasked| bool::from(unmasked.as_bytes().ct_eq(expected.as_bytes())))
}

/// Build the CSRF cookie carrying the masked token.
///
/// # Errors
/// Returns an error if masking fails or the value is not a valid header.
pub fn csrf_cookie(token: &str, secure: bool) -> Result<HeaderValue> {
    let masked = mask(token)?;
    let mut cookie = format!("{CSRF_COOKIE_NAME}={masked}; Path=/; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Build the expired CSRF cookie used on logout and teardown.
///
/// # Errors
/// Returns an error if the value is not a valid header value.
pub fn clear_csrf_cookie(secure: bool) -> Result<HeaderValue> {
    let mut cookie = format!("{CSRF_COOKIE_NAME}=; Path=/; SameSite=Strict; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}
