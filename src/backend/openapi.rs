//! OpenAPI document for the backend API.

use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::backend::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "gardisto",
        description = "Bearer token authentication service",
    ),
    paths(
        handlers::health::health,
        handlers::register::register,
        handlers::login::login,
        handlers::users::get_account,
        handlers::users::update_account,
        handlers::users::delete_account,
    ),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "Account management"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn document_lists_all_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/registration",
            "/login",
            "/users",
            "/users/{email}",
        ] {
            assert!(
                doc.paths.paths.contains_key(path),
                "missing path: {path}"
            );
        }
    }
}
