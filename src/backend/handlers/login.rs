use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

use crate::auth::{password, token, validate};
use crate::backend::handlers::validate_stored_account;
use crate::backend::state::BackendState;
use crate::backend::storage::Account;

/// Credentials presented at login. Password and activation token are
/// zeroized on drop, so plaintext does not outlive the request on any path.
#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    email: String,
    #[schema(value_type = String)]
    password: SecretString,
    #[schema(value_type = Option<String>)]
    activation_token: Option<SecretString>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub token: String,
}

fn validate_login(request: &LoginRequest) -> Result<(), String> {
    validate::validate_email(&request.email)?;
    validate::validate_password(request.password.expose_secret())?;
    if let Some(activation_token) = &request.activation_token {
        validate::validate_activation_token(activation_token.expose_secret())?;
    }
    Ok(())
}

fn unauthorized() -> Response {
    // Always a bare 401: no body, no detail, no oracle.
    StatusCode::UNAUTHORIZED.into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong.".to_string(),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Structurally invalid input", body = String),
        (status = 401, description = "Authentication failed")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<BackendState>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    if let Err(reason) = validate_login(&request) {
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }

    let account = match state.store().find(&request.email).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            warn!("Login attempt for unknown account");
            return unauthorized();
        }
        Err(err) => {
            error!("Failed to lookup account: {err}");
            return internal_error();
        }
    };

    if let Err(reason) = validate_stored_account(&account) {
        error!("Stored account is invalid: {reason}");
        return internal_error();
    }

    if !password::verify(request.password.expose_secret(), &account.password_hash) {
        warn!("Login attempt with wrong password");
        return unauthorized();
    }

    if account.is_active {
        if request.activation_token.is_some() {
            // Distinct client error; the account record is never touched.
            return (
                StatusCode::BAD_REQUEST,
                "Activation token is not necessary.".to_string(),
            )
                .into_response();
        }
    } else {
        match try_account_activation(&state, &account, request.activation_token.as_ref()).await {
            Ok(true) => {}
            Ok(false) => return unauthorized(),
            Err(err) => {
                error!("Failed to activate account: {err}");
                return internal_error();
            }
        }
    }

    let key = state.keys().current();
    let jws = match token::issue(
        key.as_bytes(),
        &account.email,
        &account.permissions,
        Utc::now().timestamp(),
        state.config().token_ttl(),
    ) {
        Ok(jws) => jws,
        Err(err) => {
            error!("Failed to issue token: {err}");
            return internal_error();
        }
    };

    (StatusCode::OK, Json(TokenResponse { token: jws })).into_response()
}

/// Activation during login: compare the supplied token byte-for-byte, then
/// let the store's compare-and-swap decide who wins. Every failure is a
/// plain `false` that collapses into the same 401 as bad credentials.
async fn try_account_activation(
    state: &BackendState,
    account: &Account,
    supplied: Option<&SecretString>,
) -> anyhow::Result<bool> {
    let Some(supplied) = supplied else {
        warn!("Inactive account tried login without an activation token");
        return Ok(false);
    };

    let Some(stored) = account.activation_token.as_deref() else {
        // validate_stored_account already rejected this shape; stay closed.
        return Ok(false);
    };

    let matches: bool = supplied
        .expose_secret()
        .as_bytes()
        .ct_eq(stored.as_bytes())
        .into();
    if !matches {
        warn!("Inactive account tried login with an invalid activation token");
        return Ok(false);
    }

    state
        .store()
        .activate(&account.email, account.last_update, stored)
        .await
}
