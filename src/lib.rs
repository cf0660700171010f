//! # Gardisto
//!
//! `gardisto` authenticates users for a set of downstream services with
//! signed bearer tokens, and relays that authentication through an edge
//! gateway that holds a browser session instead.
//!
//! ## Backend (`gardisto`)
//!
//! A stateless authentication service. Accounts are registered inactive
//! (unless activation mode is `none`) with a single-use activation token
//! delivered out-of-band. Login verifies credentials, performs the lazy
//! activation through a compare-and-swap write, and issues an HS512 access
//! token carrying subject and permission claims. The signing key lives in
//! memory and rotates on a fixed period; rotation deliberately invalidates
//! every previously issued token.
//!
//! Every authentication failure (wrong credentials, wrong or replayed
//! activation token, lost activation race, bad or expired bearer token) is
//! a bare `401` with no distinguishing detail.
//!
//! ## Gateway (`gardisto-gateway`)
//!
//! The edge component. On login it wraps the issued token in a
//! session-bound principal and hands the browser only an opaque
//! `__Host-`-prefixed session cookie; the token itself never leaves the
//! server side. Proxied calls carry the session's token as an
//! `Authorization` header. A `401` from the backend tears down the security
//! context, the session, and the CSRF state before the response reaches the
//! client. At most two sessions per account are allowed, and a dedicated
//! endpoint ends all of a user's sessions at once.

pub mod auth;
pub mod backend;
pub mod cli;
pub mod gateway;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
