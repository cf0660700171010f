//! Gateway authentication controller: registration/login forwarding and the
//! cooperative logout endpoints.
//!
//! On a successful backend login the issued token is wrapped in a
//! session-bound principal; the browser only ever receives the opaque
//! session cookie. Upstream failures of any kind collapse into a bare 401;
//! only a backend 400 with a display-safe reason passes through.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, instrument, warn};

use crate::gateway::csrf;
use crate::gateway::principal::TokenPrincipal;
use crate::gateway::session::{self, InsertOutcome, SessionHandle};
use crate::gateway::state::GatewayState;

/// `Clear-Site-Data` directives written on every logout path.
const CLEAR_SITE_DATA: &str = r#""cache", "cookies", "storage", "executionContexts""#;

/// Credentials relayed to the backend. Secrets are zeroized on drop.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    email: String,
    password: SecretString,
    activation_token: Option<SecretString>,
}

impl AuthRequest {
    /// Serialize for the upstream call; the only place the secrets are read.
    fn to_upstream_body(&self) -> Value {
        let mut body = json!({
            "email": self.email,
            "password": self.password.expose_secret(),
        });
        if let Some(activation_token) = &self.activation_token {
            body["activationToken"] = Value::from(activation_token.expose_secret());
        }
        body
    }
}

/// Registration payload relayed to the backend.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    email: String,
    password: SecretString,
    first_name: String,
    last_name: String,
    permissions: Vec<String>,
}

impl RegistrationRequest {
    fn to_upstream_body(&self) -> Value {
        json!({
            "email": self.email,
            "password": self.password.expose_secret(),
            "firstName": self.first_name,
            "lastName": self.last_name,
            "permissions": self.permissions,
        })
    }
}

#[derive(Deserialize)]
struct UpstreamTokenResponse {
    token: String,
}

fn unauthorized() -> Response {
    StatusCode::UNAUTHORIZED.into_response()
}

/// A backend 400 carries a display-safe reason; pass it through unless it
/// is blank, which would mean an upstream contract violation.
async fn pass_through_bad_request(response: reqwest::Response) -> Response {
    match response.text().await {
        Ok(reason) if !reason.trim().is_empty() => {
            (StatusCode::BAD_REQUEST, reason).into_response()
        }
        _ => {
            warn!("Upstream 400 carried no usable reason");
            unauthorized()
        }
    }
}

#[instrument(skip_all)]
pub async fn registration(
    Extension(state): Extension<GatewayState>,
    payload: Option<Json<RegistrationRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let url = match state.config().backend_url().join("/registration") {
        Ok(url) => url,
        Err(err) => {
            error!("Invalid upstream registration URL: {err}");
            return unauthorized();
        }
    };

    let response = state
        .client()
        .post(url)
        .json(&request.to_upstream_body())
        .send()
        .await;

    match response {
        Ok(response) if response.status() == StatusCode::OK => {
            // Nothing account-shaped goes back to the browser.
            StatusCode::OK.into_response()
        }
        Ok(response) if response.status() == StatusCode::BAD_REQUEST => {
            pass_through_bad_request(response).await
        }
        Ok(_) => unauthorized(),
        Err(err) => {
            error!("Upstream registration call failed: {err}");
            unauthorized()
        }
    }
}

#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<GatewayState>,
    existing_session: Option<Extension<SessionHandle>>,
    payload: Option<Json<AuthRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let url = match state.config().backend_url().join("/login") {
        Ok(url) => url,
        Err(err) => {
            error!("Invalid upstream login URL: {err}");
            return unauthorized();
        }
    };

    let response = match state
        .client()
        .post(url)
        .json(&request.to_upstream_body())
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!("Upstream login call failed: {err}");
            return unauthorized();
        }
    };

    if response.status() == StatusCode::BAD_REQUEST {
        return pass_through_bad_request(response).await;
    }
    if response.status() != StatusCode::OK {
        return unauthorized();
    }

    let token = match response.json::<UpstreamTokenResponse>().await {
        Ok(body) => body.token,
        Err(err) => {
            error!("Invalid token response from upstream: {err}");
            return unauthorized();
        }
    };

    let principal = match TokenPrincipal::from_token(token) {
        Ok(principal) => principal,
        Err(err) => {
            error!("Upstream issued an unusable token: {err}");
            return unauthorized();
        }
    };

    // Privilege change: a re-login never continues the previous session.
    if let Some(Extension(old)) = existing_session {
        state.sessions().invalidate(old.id).await;
    }

    let handle = match state.sessions().insert(principal).await {
        Ok(InsertOutcome::Created(handle)) => handle,
        Ok(InsertOutcome::Refused) => {
            warn!("Login refused: maximum concurrent sessions reached");
            return unauthorized();
        }
        Err(err) => {
            error!("Failed to create session: {err}");
            return unauthorized();
        }
    };

    match login_response_headers(&state, &handle) {
        Ok(headers) => (StatusCode::OK, headers).into_response(),
        Err(err) => {
            // Never answer 200 without the cookies; undo the session.
            error!("Failed to build login cookies: {err}");
            state.sessions().invalidate(handle.id).await;
            unauthorized()
        }
    }
}

fn login_response_headers(
    state: &GatewayState,
    handle: &SessionHandle,
) -> anyhow::Result<HeaderMap> {
    let config = state.config();
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, session::session_cookie(config, handle.id)?);
    headers.append(
        SET_COOKIE,
        csrf::csrf_cookie(&handle.csrf_token, config.session_cookie_secure())?,
    );
    Ok(headers)
}

/// Headers common to every teardown path: both cookies expired plus
/// `Clear-Site-Data`, so the client cannot silently retry with a dead
/// credential.
pub(crate) fn teardown_headers(state: &GatewayState) -> HeaderMap {
    let config = state.config();
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = session::clear_session_cookie(config) {
        headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = csrf::clear_csrf_cookie(config.session_cookie_secure()) {
        headers.append(SET_COOKIE, cookie);
    }
    if let Ok(value) = HeaderValue::from_str(CLEAR_SITE_DATA) {
        headers.insert(HeaderName::from_static("clear-site-data"), value);
    }
    headers
}

#[instrument(skip_all)]
pub async fn logout(
    Extension(state): Extension<GatewayState>,
    Extension(handle): Extension<SessionHandle>,
) -> Response {
    state.sessions().clear_security_context(handle.id).await;
    state.sessions().invalidate(handle.id).await;
    (StatusCode::OK, teardown_headers(&state)).into_response()
}

#[instrument(skip_all)]
pub async fn complete_logout(
    Extension(state): Extension<GatewayState>,
    Extension(handle): Extension<SessionHandle>,
) -> Response {
    let removed = state.sessions().invalidate_all(&handle.subject).await;
    tracing::info!(sessions = removed, "complete logout");
    (StatusCode::OK, teardown_headers(&state)).into_response()
}
