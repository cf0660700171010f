//! Session-to-bearer relay: proxies every other route to the backend with
//! the session's token attached, and reacts to an upstream 401 with the
//! full logout cascade.

use axum::{
    body::{to_bytes, Body},
    extract::{Extension, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, COOKIE, HOST, TRANSFER_ENCODING},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use tracing::{debug, error, instrument, warn};

use crate::gateway::auth::teardown_headers;
use crate::gateway::session::SessionHandle;
use crate::gateway::state::GatewayState;

/// Upper bound for buffered request/response bodies passing through the
/// relay.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Hop-by-hop and session-scoped headers that must not travel upstream.
const STRIPPED_REQUEST_HEADERS: [HeaderName; 4] =
    [AUTHORIZATION, COOKIE, HOST, CONTENT_LENGTH];

fn bad_gateway() -> Response {
    StatusCode::BAD_GATEWAY.into_response()
}

/// Fallback handler: relay the request upstream with the bearer token from
/// the session principal. The session filter has already gated this route,
/// but the relay itself tolerates an absent principal and simply forwards
/// unauthenticated: identity attachment, not access control.
#[instrument(skip_all, fields(http.method = %request.method(), http.path = request.uri().path()))]
pub async fn relay(
    Extension(state): Extension<GatewayState>,
    session: Option<Extension<SessionHandle>>,
    request: Request,
) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), ToString::to_string);

    let Ok(url) = state.config().backend_url().join(&path_and_query) else {
        warn!("Unroutable relay path");
        return bad_gateway();
    };

    let method = request.method().clone();
    let mut upstream_headers = request.headers().clone();
    for header in STRIPPED_REQUEST_HEADERS {
        upstream_headers.remove(&header);
    }
    if let Some(Extension(handle)) = &session {
        match HeaderValue::from_str(&format!("Bearer {}", handle.token)) {
            Ok(value) => {
                upstream_headers.insert(AUTHORIZATION, value);
            }
            Err(err) => {
                error!("Session token is not header-safe: {err}");
                return bad_gateway();
            }
        }
    }

    let body = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Failed to buffer relay request body: {err}");
            return (StatusCode::PAYLOAD_TOO_LARGE, String::new()).into_response();
        }
    };

    let upstream = state
        .client()
        .request(method, url)
        .headers(upstream_headers)
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(err) => {
            error!("Upstream call failed: {err}");
            return bad_gateway();
        }
    };

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    response_headers.remove(TRANSFER_ENCODING);
    response_headers.remove(CONTENT_LENGTH);

    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to read upstream response body: {err}");
            return bad_gateway();
        }
    };

    if status == StatusCode::UNAUTHORIZED {
        // The downstream rejection proves the session credential is dead,
        // whatever the reason. Tear everything down before the response
        // body reaches the client.
        if let Some(Extension(handle)) = session {
            cascade_logout(&state, handle).await;
        }
        response_headers.extend(teardown_headers(&state));
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    merge_headers(response.headers_mut(), response_headers);
    response
}

/// Run the four-step teardown to completion. The work is spawned and then
/// awaited so that a client disconnect cannot cancel it halfway; session
/// destruction must never be left in a torn state.
async fn cascade_logout(state: &GatewayState, handle: SessionHandle) {
    let state = state.clone();
    let task = tokio::spawn(async move {
        state.sessions().clear_security_context(handle.id).await;
        state.sessions().invalidate(handle.id).await;
        state.sessions().clear_csrf_token(handle.id).await;
        debug!(subject = %handle.subject, "cascade logout after upstream 401");
    });
    if let Err(err) = task.await {
        error!("Cascade logout task failed: {err}");
    }
}

fn merge_headers(target: &mut HeaderMap, source: HeaderMap) {
    let mut last_name: Option<HeaderName> = None;
    for (name, value) in source {
        let name = name.or_else(|| last_name.clone());
        if let Some(name) = name {
            target.append(name.clone(), value);
            last_name = Some(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::merge_headers;
    use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};

    #[test]
    fn merge_preserves_repeated_headers() {
        let mut source = HeaderMap::new();
        source.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        source.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        let mut target = HeaderMap::new();
        merge_headers(&mut target, source);
        let values: Vec<_> = target
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(values, ["a=1", "b=2"]);
    }
}
