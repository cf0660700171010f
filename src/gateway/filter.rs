//! Gateway request filters: method firewall, session resolution, and CSRF
//! enforcement.
//!
//! A missing session, an expired session, and a failed CSRF check all
//! collapse into the same bare 401, so the error channel reveals nothing
//! about which gate rejected the request.

use axum::{
    extract::{Extension, Request},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::gateway::csrf;
use crate::gateway::session::{session_id_from_headers, SessionHandle};
use crate::gateway::state::GatewayState;

/// The two unauthenticated entry points, matched exactly.
pub const EXEMPT_PATHS: &[&str] = &["/login", "/registration"];

/// Header carrying the double-submitted CSRF value.
pub const CSRF_HEADER: &str = "x-xsrf-token";

fn path_is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

/// Resolve the session cookie and gate protected routes.
///
/// The method firewall runs first; unknown methods never reach a handler.
/// A resolved [`SessionHandle`] is attached for downstream filters and
/// handlers either way; the exempt paths still want to know about an
/// existing session (re-login rotates it).
pub async fn session_filter(
    Extension(state): Extension<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.config().allowed_methods().contains(request.method()) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let session = match session_id_from_headers(
        request.headers(),
        state.config().session_cookie_name(),
    ) {
        Some(id) => state.sessions().resolve(id).await,
        None => None,
    };

    if let Some(handle) = session {
        request.extensions_mut().insert(handle);
    } else if !path_is_exempt(request.uri().path()) {
        // Missing and expired sessions are the same bare outcome.
        return StatusCode::UNAUTHORIZED.into_response();
    }

    next.run(request).await
}

/// Enforce the double-submit CSRF token on every state-changing request
/// except the two exempt entry points.
pub async fn csrf_filter(request: Request, next: Next) -> Response {
    let method = request.method();
    let safe_method = *method == Method::GET
        || *method == Method::HEAD
        || *method == Method::OPTIONS
        || *method == Method::TRACE;

    if !safe_method && !path_is_exempt(request.uri().path()) {
        let Some(handle) = request.extensions().get::<SessionHandle>() else {
            return StatusCode::UNAUTHORIZED.into_response();
        };

        let presented = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok());
        let confirmed =
            presented.is_some_and(|value| csrf::matches(&handle.csrf_token, value));
        if !confirmed {
            debug!("could not confirm csrf token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::{path_is_exempt, CSRF_HEADER, EXEMPT_PATHS};

    #[test]
    fn exemptions_are_exact_paths() {
        assert!(path_is_exempt("/login"));
        assert!(path_is_exempt("/registration"));
        assert!(!path_is_exempt("/login/"));
        assert!(!path_is_exempt("/logout"));
        assert!(!path_is_exempt("/users/a@bb.com"));
        assert_eq!(EXEMPT_PATHS.len(), 2);
    }

    #[test]
    fn csrf_header_name_is_lowercase() {
        // HeaderMap lookups are case-insensitive but the constant must be a
        // valid lowercase header name.
        assert_eq!(CSRF_HEADER, CSRF_HEADER.to_lowercase());
    }
}
