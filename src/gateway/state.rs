//! Gateway configuration and shared request state.

use anyhow::{Context, Result};
use axum::http::Method;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::gateway::session::SessionStore;
use crate::APP_USER_AGENT;

const DEFAULT_SESSION_COOKIE_NAME: &str = "GS";
const DEFAULT_MAX_SESSIONS: usize = 2;
const DEFAULT_SESSION_IDLE_SECONDS: u64 = 1800;

/// Default method firewall: everything else is rejected outright.
pub const DEFAULT_ALLOWED_METHODS: [Method; 4] =
    [Method::GET, Method::POST, Method::PUT, Method::DELETE];

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    backend_url: Url,
    session_cookie_name: String,
    session_cookie_secure: bool,
    max_sessions: usize,
    session_idle_seconds: u64,
    allowed_origins: Vec<String>,
    allowed_methods: Vec<Method>,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(backend_url: Url) -> Self {
        Self {
            backend_url,
            session_cookie_name: format!("__Host-{DEFAULT_SESSION_COOKIE_NAME}"),
            session_cookie_secure: false,
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_idle_seconds: DEFAULT_SESSION_IDLE_SECONDS,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: DEFAULT_ALLOWED_METHODS.to_vec(),
        }
    }

    /// Set the custom part of the session cookie name; the `__Host-` prefix
    /// is always applied to bind the cookie to a secure, host-restricted
    /// scope. Blank names fall back to the default.
    #[must_use]
    pub fn with_session_cookie_name(mut self, name: &str) -> Self {
        let name = if name.trim().is_empty() {
            DEFAULT_SESSION_COOKIE_NAME
        } else {
            name
        };
        self.session_cookie_name = format!("__Host-{name}");
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    #[must_use]
    pub fn with_session_idle_seconds(mut self, seconds: u64) -> Self {
        self.session_idle_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        if !origins.is_empty() {
            self.allowed_origins = origins;
        }
        self
    }

    #[must_use]
    pub fn with_allowed_methods(mut self, methods: Vec<Method>) -> Self {
        if !methods.is_empty() {
            self.allowed_methods = methods;
        }
        self
    }

    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    #[must_use]
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_seconds)
    }

    #[must_use]
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    #[must_use]
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }
}

/// Shared state for every gateway request.
#[derive(Clone)]
pub struct GatewayState {
    sessions: Arc<SessionStore>,
    client: Client,
    config: Arc<GatewayConfig>,
}

impl GatewayState {
    /// Build the gateway state, including the upstream HTTP client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let sessions = Arc::new(SessionStore::new(
            config.max_sessions(),
            config.session_idle(),
        ));
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build upstream HTTP client")?;
        Ok(Self {
            sessions,
            client,
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayConfig, DEFAULT_ALLOWED_METHODS};
    use axum::http::Method;
    use std::time::Duration;
    use url::Url;

    fn backend_url() -> Url {
        Url::parse("http://localhost:8080").expect("valid url")
    }

    #[test]
    fn defaults() {
        let config = GatewayConfig::new(backend_url());
        assert_eq!(config.session_cookie_name(), "__Host-GS");
        assert!(!config.session_cookie_secure());
        assert_eq!(config.max_sessions(), 2);
        assert_eq!(config.session_idle(), Duration::from_secs(1800));
        assert_eq!(config.allowed_origins(), ["*".to_string()]);
        assert_eq!(config.allowed_methods(), DEFAULT_ALLOWED_METHODS);
    }

    #[test]
    fn cookie_name_always_host_prefixed() {
        let config = GatewayConfig::new(backend_url()).with_session_cookie_name("SID");
        assert_eq!(config.session_cookie_name(), "__Host-SID");

        // Blank custom names fall back to the default.
        let config = GatewayConfig::new(backend_url()).with_session_cookie_name("  ");
        assert_eq!(config.session_cookie_name(), "__Host-GS");
    }

    #[test]
    fn overrides() {
        let config = GatewayConfig::new(backend_url())
            .with_session_cookie_secure(true)
            .with_max_sessions(3)
            .with_session_idle_seconds(60)
            .with_allowed_origins(vec!["https://app.example".to_string()])
            .with_allowed_methods(vec![Method::GET, Method::POST]);
        assert!(config.session_cookie_secure());
        assert_eq!(config.max_sessions(), 3);
        assert_eq!(config.session_idle(), Duration::from_secs(60));
        assert_eq!(config.allowed_origins(), ["https://app.example".to_string()]);
        assert_eq!(config.allowed_methods(), [Method::GET, Method::POST]);
    }

    #[test]
    fn empty_overrides_keep_defaults() {
        let config = GatewayConfig::new(backend_url())
            .with_allowed_origins(vec![])
            .with_allowed_methods(vec![]);
        assert_eq!(config.allowed_origins(), ["*".to_string()]);
        assert_eq!(config.allowed_methods(), DEFAULT_ALLOWED_METHODS);
    }
}
