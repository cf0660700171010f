use crate::gateway;
use crate::gateway::state::{GatewayConfig, GatewayState};
use anyhow::Result;
use axum::http::Method;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: Url,
    pub max_sessions: usize,
    pub session_cookie_name: String,
    pub session_cookie_secure: bool,
    pub session_idle_seconds: u64,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
}

/// Execute the gateway server action.
///
/// # Errors
/// Returns an error if the state cannot be built or the server fails to
/// start.
pub async fn execute(args: Args) -> Result<()> {
    let config = GatewayConfig::new(args.backend_url)
        .with_session_cookie_name(&args.session_cookie_name)
        .with_session_cookie_secure(args.session_cookie_secure)
        .with_max_sessions(args.max_sessions)
        .with_session_idle_seconds(args.session_idle_seconds)
        .with_allowed_origins(args.allowed_origins)
        .with_allowed_methods(args.allowed_methods);

    info!(
        backend_url = %config.backend_url(),
        max_sessions = config.max_sessions(),
        "Starting gateway"
    );

    let state = GatewayState::new(config)?;

    gateway::new(args.port, state).await
}
