//! In-memory web session store and the session cookie.
//!
//! Sessions exist only after a successful login and hold the principal that
//! owns the bearer token. An account may hold at most `max_sessions`
//! concurrent sessions; a further login is refused, never evicted. The
//! browser only ever sees the opaque session id, as a `__Host-`-prefixed,
//! `HttpOnly`, `SameSite=Strict` cookie.

use anyhow::Result;
use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::gateway::csrf;
use crate::gateway::principal::TokenPrincipal;
use crate::gateway::state::GatewayConfig;

struct Session {
    subject: String,
    principal: Option<TokenPrincipal>,
    csrf_token: Option<String>,
    created_at: Instant,
    last_access: Instant,
}

/// Per-request view of a live session. The token is borrowed from the
/// session for the duration of one request and must not be cached.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub subject: String,
    pub token: String,
    pub csrf_token: String,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// Outcome of a login attempt against the concurrent-session cap.
pub enum InsertOutcome {
    Created(SessionHandle),
    /// The account already holds the maximum number of live sessions.
    Refused,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions,
            idle_timeout,
        }
    }

    /// Create a session for a freshly authenticated principal, enforcing
    /// the per-account cap. The new session id and CSRF token are generated
    /// here; ids are never reused across logins.
    ///
    /// # Errors
    /// Returns an error if token generation fails.
    pub async fn insert(&self, principal: TokenPrincipal) -> Result<InsertOutcome> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, session| session.last_access.elapsed() < self.idle_timeout);

        let live = sessions
            .values()
            .filter(|session| session.subject == principal.subject())
            .count();
        if live >= self.max_sessions {
            return Ok(InsertOutcome::Refused);
        }

        let id = Uuid::new_v4();
        let csrf_token = csrf::generate_token()?;
        let now = Instant::now();
        let handle = SessionHandle {
            id,
            subject: principal.subject().to_string(),
            token: principal.token().to_string(),
            csrf_token: csrf_token.clone(),
        };
        sessions.insert(
            id,
            Session {
                subject: principal.subject().to_string(),
                principal: Some(principal),
                csrf_token: Some(csrf_token),
                created_at: now,
                last_access: now,
            },
        );
        Ok(InsertOutcome::Created(handle))
    }

    /// Resolve a session id into a handle, refreshing its idle clock.
    /// Sessions whose principal or CSRF state was already torn down no
    /// longer authenticate.
    pub async fn resolve(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&id)?;
        if session.last_access.elapsed() >= self.idle_timeout {
            sessions.remove(&id);
            return None;
        }
        session.last_access = Instant::now();

        let principal = session.principal.as_ref()?;
        let csrf_token = session.csrf_token.as_ref()?;
        Some(SessionHandle {
            id,
            subject: session.subject.clone(),
            token: principal.token().to_string(),
            csrf_token: csrf_token.clone(),
        })
    }

    /// Drop the stored security context, leaving the session shell behind.
    /// First step of the 401 teardown cascade.
    pub async fn clear_security_context(&self, id: Uuid) {
        if let Some(session) = self.sessions.lock().await.get_mut(&id) {
            session.principal = None;
        }
    }

    /// Drop the per-session CSRF token.
    pub async fn clear_csrf_token(&self, id: Uuid) {
        if let Some(session) = self.sessions.lock().await.get_mut(&id) {
            session.csrf_token = None;
        }
    }

    /// Invalidate one session. Idempotent.
    pub async fn invalidate(&self, id: Uuid) -> bool {
        match self.sessions.lock().await.remove(&id) {
            Some(session) => {
                debug!(
                    subject = %session.subject,
                    lifetime_secs = session.created_at.elapsed().as_secs(),
                    "session invalidated"
                );
                true
            }
            None => false,
        }
    }

    /// Invalidate every session belonging to `subject` (complete logout),
    /// returning how many were removed.
    pub async fn invalidate_all(&self, subject: &str) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.subject != subject);
        before - sessions.len()
    }

    /// Live sessions held by `subject`.
    pub async fn count(&self, subject: &str) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|session| {
                session.subject == subject && session.last_access.elapsed() < self.idle_timeout
            })
            .count()
    }

}

/// Read the session id from the request's cookie header.
#[must_use]
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Uuid> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == cookie_name {
            return Uuid::parse_str(val).ok();
        }
    }
    None
}

/// Build the session cookie for a fresh login.
///
/// # Errors
/// Returns an error if the value is not a valid header value.
pub fn session_cookie(config: &GatewayConfig, id: Uuid) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{}={id}; Path=/; HttpOnly; SameSite=Strict",
        config.session_cookie_name()
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Build the expired session cookie used on logout and teardown.
///
/// # Errors
/// Returns an error if the value is not a valid header value.
pub fn clear_session_cookie(config: &GatewayConfig) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        config.session_cookie_name()
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}
