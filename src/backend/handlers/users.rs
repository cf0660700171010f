//! Account read/update/delete endpoints.
//!
//! All three require an authenticated principal. Domain "not found" style
//! failures map to 400 at this boundary; the bodies are display-safe.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, instrument};

use crate::auth::validate;
use crate::backend::filter::Principal;
use crate::backend::handlers::validate_stored_account;
use crate::backend::state::BackendState;
use crate::backend::storage::AccountSummary;

fn validate_summary(summary: &AccountSummary) -> Result<(), String> {
    validate::validate_email(&summary.email)?;
    validate::validate_name(&summary.first_name, "First")?;
    validate::validate_name(&summary.last_name, "Last")?;
    validate::validate_timestamp(summary.creation, "Creation")?;
    validate::validate_timestamp(summary.last_update, "LastUpdate")?;
    validate::validate_permissions(&summary.permissions)?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/users/{email}",
    responses(
        (status = 200, description = "Account found", body = AccountSummary),
        (status = 400, description = "Invalid email or unknown account", body = String),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn get_account(
    _principal: Principal,
    Extension(state): Extension<BackendState>,
    Path(email): Path<String>,
) -> Response {
    if let Err(reason) = validate::validate_email(&email) {
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }

    let account = match state.store().find(&email).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return (StatusCode::BAD_REQUEST, "User not found.".to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to lookup account: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong.".to_string(),
            )
                .into_response();
        }
    };

    if let Err(reason) = validate_stored_account(&account) {
        error!("Stored account is invalid: {reason}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong.".to_string(),
        )
            .into_response();
    }

    (StatusCode::OK, Json(AccountSummary::from(&account))).into_response()
}

#[utoipa::path(
    put,
    path = "/users",
    request_body = AccountSummary,
    responses(
        (status = 200, description = "Account updated"),
        (status = 400, description = "Validation failure or lost update", body = String),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn update_account(
    _principal: Principal,
    Extension(state): Extension<BackendState>,
    payload: Option<Json<AccountSummary>>,
) -> Response {
    let Some(Json(summary)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    if let Err(reason) = validate_summary(&summary) {
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }

    match state.store().update_profile(&summary).await {
        Ok(true) => StatusCode::OK.into_response(),
        // Lost update or unknown account, indistinguishable on purpose.
        Ok(false) => (StatusCode::BAD_REQUEST, "User not updated.".to_string()).into_response(),
        Err(err) => {
            error!("Failed to update account: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong.".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/users/{email}",
    responses(
        (status = 200, description = "Account deleted"),
        (status = 400, description = "Invalid email or nothing deleted", body = String),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn delete_account(
    _principal: Principal,
    Extension(state): Extension<BackendState>,
    Path(email): Path<String>,
) -> Response {
    if let Err(reason) = validate::validate_email(&email) {
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }

    match state.store().delete(&email).await {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => (StatusCode::BAD_REQUEST, "User not deleted.".to_string()).into_response(),
        Err(err) => {
            error!("Failed to delete account: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong.".to_string(),
            )
                .into_response()
        }
    }
}
