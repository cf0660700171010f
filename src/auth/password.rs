//! One-way password hashing (Argon2id).
//!
//! The login protocol only needs `hash` at registration and `verify` at
//! login; the algorithm is otherwise pluggable as long as hashes stay
//! self-describing PHC strings.

use anyhow::{anyhow, Result};
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;

/// Hash a plaintext password into a PHC string.
///
/// # Errors
/// Returns an error if hashing fails (effectively only on RNG failure).
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Verify a plaintext password against a stored PHC string.
///
/// An unparseable stored hash counts as a mismatch; login must not turn a
/// corrupt document into a distinguishable error.
#[must_use]
pub fn verify(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}
