use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{error, instrument};
use utoipa::ToSchema;

use crate::auth::{activation::ConfirmRegistration, password, validate};
use crate::backend::state::BackendState;
use crate::backend::storage::{Account, InsertOutcome};

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    email: String,
    #[schema(value_type = String)]
    password: SecretString,
    first_name: String,
    last_name: String,
    permissions: Vec<String>,
}

fn validate_registration(request: &RegistrationRequest) -> Result<(), String> {
    validate::validate_email(&request.email)?;
    validate::validate_name(&request.first_name, "First")?;
    validate::validate_name(&request.last_name, "Last")?;
    validate::validate_permissions(&request.permissions)?;
    validate::validate_password(request.password.expose_secret())?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/registration",
    request_body = RegistrationRequest,
    responses(
        (status = 200, description = "Account registered"),
        (status = 400, description = "Validation or save failure", body = String)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(state): Extension<BackendState>,
    payload: Option<Json<RegistrationRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string());
    };

    if let Err(reason) = validate_registration(&request) {
        return (StatusCode::BAD_REQUEST, reason);
    }

    let password_hash = match password::hash(request.password.expose_secret()) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong.".to_string(),
            );
        }
    };

    let confirm = match ConfirmRegistration::new(state.config().activation_mode()) {
        Ok(confirm) => confirm,
        Err(err) => {
            error!("Failed to prepare registration confirmation: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong.".to_string(),
            );
        }
    };

    let now = Utc::now();
    let account = Account {
        email: request.email.clone(),
        password_hash,
        first_name: request.first_name.clone(),
        last_name: request.last_name.clone(),
        creation: now,
        last_update: now,
        permissions: request.permissions.clone(),
        is_active: confirm.account_starts_active(),
        activation_token: confirm.token().map(str::to_string),
    };

    match state.store().insert(account).await {
        Ok(InsertOutcome::Created) => {}
        Ok(InsertOutcome::Conflict) => {
            error!("Account already exists");
            return (StatusCode::BAD_REQUEST, "User not registered.".to_string());
        }
        Err(err) => {
            error!("Failed to insert account: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong.".to_string(),
            );
        }
    }

    if let Err(err) = confirm.send_confirmation(state.mail(), &request.email) {
        // TODO distinguish "saved but confirmation undelivered" from a plain
        // save failure once a real mail sender is wired in.
        error!("Account saved but confirmation not sent: {err}");
        return (StatusCode::BAD_REQUEST, "User not registered.".to_string());
    }

    (StatusCode::OK, request.email)
}
