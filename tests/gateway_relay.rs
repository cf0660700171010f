//! End-to-end tests for the gateway in front of a real backend.
//!
//! Both routers are served in-process on ephemeral ports; the backend runs
//! on the in-memory store. Cookies are handled manually so the tests can
//! assert on exact cookie attributes and replay dead session ids.

use anyhow::{Context, Result};
use gardisto::auth::activation::{ActivationMode, LogMailSender};
use gardisto::auth::keystore::SigningKeyStore;
use gardisto::backend::{
    self,
    state::{BackendConfig, BackendState},
    storage::MemoryAccountStore,
};
use gardisto::gateway::{
    self,
    state::{GatewayConfig, GatewayState},
};
use reqwest::{
    header::{HeaderValue, COOKIE, SET_COOKIE},
    Response, StatusCode,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

const SESSION_COOKIE: &str = "__Host-GS";
const CSRF_COOKIE: &str = "XSRF-TOKEN";
const CSRF_HEADER: &str = "x-xsrf-token";

struct TestEnv {
    gateway_url: String,
    keys: Arc<SigningKeyStore>,
    client: reqwest::Client,
}

/// A logged-in browser: the opaque session cookie plus the masked CSRF
/// value it would read from the CSRF cookie.
struct BrowserSession {
    session_cookie: String,
    csrf_value: String,
}

async fn spawn_pair(mode: ActivationMode) -> Result<TestEnv> {
    let keys = Arc::new(SigningKeyStore::new()?);
    let backend_state = BackendState::new(
        Arc::new(MemoryAccountStore::new()),
        keys.clone(),
        Arc::new(LogMailSender),
        BackendConfig::new(mode),
    );
    let backend_listener = TcpListener::bind("127.0.0.1:0").await?;
    let backend_addr = backend_listener.local_addr()?;
    let backend_app = backend::router(backend_state);
    tokio::spawn(async move {
        let _ = axum::serve(backend_listener, backend_app.into_make_service()).await;
    });

    let config = GatewayConfig::new(Url::parse(&format!("http://{backend_addr}"))?);
    let gateway_state = GatewayState::new(config)?;
    let gateway_listener = TcpListener::bind("127.0.0.1:0").await?;
    let gateway_addr = gateway_listener.local_addr()?;
    let gateway_app = gateway::router(gateway_state)?;
    tokio::spawn(async move {
        let _ = axum::serve(gateway_listener, gateway_app.into_make_service()).await;
    });

    Ok(TestEnv {
        gateway_url: format!("http://{gateway_addr}"),
        keys,
        client: reqwest::Client::new(),
    })
}

fn cookie_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            cookie
                .strip_prefix(&format!("{name}="))
                .and_then(|rest| rest.split(';').next())
                .map(str::to_string)
        })
}

fn cookie_header(session: &BrowserSession) -> HeaderValue {
    HeaderValue::from_str(&format!("{SESSION_COOKIE}={}", session.session_cookie))
        .expect("cookie header")
}

async fn register(env: &TestEnv, email: &str) -> Result<Response> {
    env.client
        .post(format!("{}/registration", env.gateway_url))
        .json(&json!({
            "email": email,
            "password": "Aa1!aaaa",
            "firstName": "Ann",
            "lastName": "Lee",
            "permissions": [],
        }))
        .send()
        .await
        .context("registration via gateway failed")
}

async fn login(env: &TestEnv, email: &str) -> Result<Response> {
    env.client
        .post(format!("{}/login", env.gateway_url))
        .json(&json!({"email": email, "password": "Aa1!aaaa"}))
        .send()
        .await
        .context("login via gateway failed")
}

async fn login_session(env: &TestEnv, email: &str) -> Result<BrowserSession> {
    let response = login(env, email).await?;
    anyhow::ensure!(
        response.status() == StatusCode::OK,
        "login failed: {}",
        response.status()
    );
    let session_cookie = cookie_value(&response, SESSION_COOKIE).context("no session cookie")?;
    let csrf_value = cookie_value(&response, CSRF_COOKIE).context("no csrf cookie")?;
    Ok(BrowserSession {
        session_cookie,
        csrf_value,
    })
}

#[tokio::test]
async fn login_returns_only_an_opaque_session_cookie() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;
    let response = register(&env, "a@b.com").await?;
    assert_eq!(response.status(), StatusCode::OK);
    // The gateway never forwards account data back to the browser.
    assert_eq!(response.text().await?, "");

    let response = login(&env, "a@b.com").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let session_cookie_raw = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|cookie| cookie.starts_with(SESSION_COOKIE))
        .context("no session cookie")?
        .to_string();
    assert!(session_cookie_raw.contains("Path=/"));
    assert!(session_cookie_raw.contains("HttpOnly"));
    assert!(session_cookie_raw.contains("SameSite=Strict"));

    // The body is empty: the issued token never reaches the browser.
    assert_eq!(response.text().await?, "");
    Ok(())
}

#[tokio::test]
async fn relay_attaches_the_bearer_token_for_the_session() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;
    register(&env, "a@b.com").await?;
    let session = login_session(&env, "a@b.com").await?;

    // Without a session the gateway answers 401 before relaying anything.
    let response = env
        .client
        .get(format!("{}/users/a@b.com", env.gateway_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text().await?, "");

    // With the session cookie, the relay injects the Authorization header
    // and the backend's protected route answers.
    let response = env
        .client
        .get(format!("{}/users/a@b.com", env.gateway_url))
        .header(COOKIE, cookie_header(&session))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let summary: serde_json::Value = response.json().await?;
    assert_eq!(
        summary.get("email").and_then(serde_json::Value::as_str),
        Some("a@b.com")
    );
    Ok(())
}

#[tokio::test]
async fn state_changing_requests_require_the_csrf_token() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;
    register(&env, "a@b.com").await?;
    let session = login_session(&env, "a@b.com").await?;

    // No CSRF header: refused before anything is relayed.
    let response = env
        .client
        .put(format!("{}/users", env.gateway_url))
        .header(COOKIE, cookie_header(&session))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text().await?, "");

    // The masked cookie value double-submitted as a header passes the
    // check; the backend then rejects the empty payload, proving the
    // request got relayed.
    let response = env
        .client
        .put(format!("{}/users", env.gateway_url))
        .header(COOKIE, cookie_header(&session))
        .header(CSRF_HEADER, &session.csrf_value)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await?, "Missing payload");

    // A foreign value is refused like a missing one.
    let response = env
        .client
        .put(format!("{}/users", env.gateway_url))
        .header(COOKIE, cookie_header(&session))
        .header(CSRF_HEADER, "AAAAAAAA")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn upstream_401_tears_the_session_down_before_responding() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;
    register(&env, "a@b.com").await?;
    let session = login_session(&env, "a@b.com").await?;

    // Rotate the backend's signing key: the session's token is now dead.
    env.keys.rotate();

    let response = env
        .client
        .get(format!("{}/users/a@b.com", env.gateway_url))
        .header(COOKIE, cookie_header(&session))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("clear-site-data").is_some());
    // Both cookies come back expired.
    assert_eq!(cookie_value(&response, SESSION_COOKIE).as_deref(), Some(""));
    assert_eq!(cookie_value(&response, CSRF_COOKIE).as_deref(), Some(""));

    // The old cookie no longer authenticates: the session is gone, not
    // merely rejected upstream.
    let response = env
        .client
        .get(format!("{}/users/a@b.com", env.gateway_url))
        .header(COOKIE, cookie_header(&session))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("clear-site-data").is_none());
    Ok(())
}

#[tokio::test]
async fn third_concurrent_login_is_refused_until_one_logs_out() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;
    register(&env, "a@b.com").await?;

    let first = login_session(&env, "a@b.com").await?;
    let _second = login_session(&env, "a@b.com").await?;

    // Two live sessions: the cap refuses a third login outright.
    let response = login(&env, "a@b.com").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text().await?, "");

    // Ordinary logout ends only the current session...
    let response = env
        .client
        .post(format!("{}/logout", env.gateway_url))
        .header(COOKIE, cookie_header(&first))
        .header(CSRF_HEADER, &first.csrf_value)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("clear-site-data").is_some());

    // ...which frees a slot for a new login.
    let response = login(&env, "a@b.com").await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn complete_logout_ends_every_session_of_the_principal() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;
    register(&env, "a@b.com").await?;
    register(&env, "b@bb.com").await?;

    let first = login_session(&env, "a@b.com").await?;
    let second = login_session(&env, "a@b.com").await?;
    let other = login_session(&env, "b@bb.com").await?;

    let response = env
        .client
        .post(format!("{}/complete-logout", env.gateway_url))
        .header(COOKIE, cookie_header(&first))
        .header(CSRF_HEADER, &first.csrf_value)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Both of the principal's sessions are dead, including the one that
    // did not make the call.
    for session in [&first, &second] {
        let response = env
            .client
            .get(format!("{}/users/a@b.com", env.gateway_url))
            .header(COOKIE, cookie_header(session))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Another principal's session survives.
    let response = env
        .client
        .get(format!("{}/users/b@bb.com", env.gateway_url))
        .header(COOKIE, cookie_header(&other))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn relogin_rotates_the_session_id() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;
    register(&env, "a@b.com").await?;
    let session = login_session(&env, "a@b.com").await?;

    // Logging in again over the existing session replaces it.
    let response = env
        .client
        .post(format!("{}/login", env.gateway_url))
        .header(COOKIE, cookie_header(&session))
        .json(&json!({"email": "a@b.com", "password": "Aa1!aaaa"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = cookie_value(&response, SESSION_COOKIE).context("no session cookie")?;
    assert_ne!(rotated, session.session_cookie);

    // The superseded id is dead.
    let response = env
        .client
        .get(format!("{}/users/a@b.com", env.gateway_url))
        .header(COOKIE, cookie_header(&session))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn gateway_passes_safe_400_reasons_through() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;

    let response = env
        .client
        .post(format!("{}/registration", env.gateway_url))
        .json(&json!({
            "email": "a@b.com",
            "password": "weak",
            "firstName": "Ann",
            "lastName": "Lee",
            "permissions": [],
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.text().await?.is_empty());

    // Login of an unregistered user: bare 401 passes through untouched.
    let response = login(&env, "a@b.com").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text().await?, "");
    Ok(())
}

#[tokio::test]
async fn unknown_methods_never_reach_the_backend() -> Result<()> {
    let env = spawn_pair(ActivationMode::None).await?;

    let response = env
        .client
        .patch(format!("{}/users", env.gateway_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}
