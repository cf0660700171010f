//! The edge gateway: session-holding, CSRF-protected relay in front of the
//! backend authentication service.
//!
//! The pipeline is fully event-driven; each request may suspend at the
//! session lookup, the proxied call, and the session store writes, but its
//! own session/CSRF/security-context writes always happen before its
//! response is flushed.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{
        header::{CONTENT_TYPE, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY},
        HeaderName, HeaderValue, Request,
    },
    middleware,
    routing::post,
    Router,
};
use tokio::{net::TcpListener, sync::mpsc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod auth;
pub mod csrf;
pub mod filter;
pub mod principal;
pub mod relay;
pub mod session;
pub mod state;

use state::GatewayState;

/// Build the gateway router: the four authentication endpoints plus the
/// relay fallback, wrapped by the method firewall, session resolution, and
/// CSRF enforcement.
///
/// # Errors
/// Returns an error if the configured CORS origins are not valid header
/// values.
pub fn router(state: GatewayState) -> Result<Router> {
    let cors = cors_layer(&state)?;

    Ok(Router::new()
        .route("/registration", post(auth::registration))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/complete-logout", post(auth::complete_logout))
        .fallback(relay::relay)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::if_not_present(
                    STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(cors)
                .layer(Extension(state))
                .layer(middleware::from_fn(filter::session_filter))
                .layer(middleware::from_fn(filter::csrf_filter)),
        ))
}

fn cors_layer(state: &GatewayState) -> Result<CorsLayer> {
    let config = state.config();

    let origins = config.allowed_origins();
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let parsed = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("Invalid CORS origin: {origin}"))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(parsed)
    };

    Ok(CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(filter::CSRF_HEADER),
        ])
        .allow_methods(config.allowed_methods().to_vec())
        .allow_origin(allow_origin))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: GatewayState) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    serve(listener, state).await
}

/// Serve the gateway on an already-bound listener, shutting down on ctrl-c.
/// # Errors
/// Return error if the server loop fails
pub async fn serve(listener: TcpListener, state: GatewayState) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });

    let app = router(state)?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            rx.recv().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
