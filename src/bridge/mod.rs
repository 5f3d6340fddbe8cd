pub mod controller;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod session;
pub mod token;

pub use controller::SessionController;
pub use error::Error;
pub use handlers::{BridgeConfig, BridgeState};

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "authbridge", description = "Session and token authentication bridge"),
    paths(
        handlers::health::health,
        handlers::login::login_page,
        handlers::login::login_submit,
        handlers::auth::auth_token,
        handlers::auth::auth_logout,
        handlers::auth::issue_token,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::login::LoginForm,
        handlers::auth::TokenForm,
        handlers::auth::IssueForm,
    )),
    tags(
        (name = "auth", description = "Session login, logout and tokens"),
        (name = "health", description = "Liveness"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc
}

/// Build the application router.
///
/// `POST /auth/token/` needs the peer address, so serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/login/",
            get(handlers::login_page).post(handlers::login_submit),
        )
        .route("/auth/", post(handlers::auth_token))
        .route("/auth/logout/", post(handlers::auth_logout))
        .route("/auth/token/", post(handlers::issue_token))
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
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<BridgeState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {err}");
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_every_route() {
        let doc = openapi();
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        for path in ["/health", "/login/", "/auth/", "/auth/logout/", "/auth/token/"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
