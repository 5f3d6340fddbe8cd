//! Token login, logout and token issuance.

use super::{session_headers, valid_username, BridgeState};
use crate::bridge::Error;
use axum::{
    extract::{ConnectInfo, Extension, Form},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tracing::{instrument, warn};
use utoipa::ToSchema;

#[derive(Deserialize, Default, ToSchema)]
pub struct TokenForm {
    #[serde(default)]
    token: Option<String>,
}

impl std::fmt::Debug for TokenForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenForm")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct IssueForm {
    #[serde(default)]
    username: Option<String>,
}

#[utoipa::path(
    post,
    path = "/auth/",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Logged in, body is the username", body = String),
        (status = 400, description = "Missing token", body = String),
        (status = 401, description = "Invalid token", body = String),
        (status = 404, description = "User not found", body = String),
        (status = 503, description = "Directory unavailable", body = String)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn auth_token(
    headers: HeaderMap,
    state: Extension<Arc<BridgeState>>,
    form: Option<Form<TokenForm>>,
) -> Response {
    let Some(token) = form.and_then(|Form(form)| form.token) else {
        return Error::MissingToken.into_response();
    };

    let mut ctx = state.context(&headers).await;

    match state.controller().login_with_token(&mut ctx, &token).await {
        Ok(principal) => (
            StatusCode::OK,
            session_headers(state.config(), &ctx),
            principal.username().to_string(),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout/",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Session cleared")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn auth_logout(
    headers: HeaderMap,
    state: Extension<Arc<BridgeState>>,
    form: Option<Form<TokenForm>>,
) -> Response {
    let token = form.and_then(|Form(form)| form.token);
    let mut ctx = state.context(&headers).await;

    state.controller().logout(&mut ctx, token.as_deref()).await;

    // always clear the cookie, even if there was no session
    (StatusCode::OK, session_headers(state.config(), &ctx)).into_response()
}

#[utoipa::path(
    post,
    path = "/auth/token/",
    request_body(content = IssueForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Signed token for the user", body = String),
        (status = 400, description = "Missing or malformed username", body = String),
        (status = 403, description = "Caller is not a trusted issuer", body = String),
        (status = 404, description = "User not found", body = String),
        (status = 500, description = "Token secret not configured", body = String),
        (status = 503, description = "Directory unavailable", body = String)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn issue_token(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    state: Extension<Arc<BridgeState>>,
    form: Option<Form<IssueForm>>,
) -> Response {
    if !state.config().is_trusted_issuer(addr.ip()) {
        warn!("Untrusted caller requested a token: {}", addr.ip());
        return Error::Forbidden.into_response();
    }

    let username = form
        .and_then(|Form(form)| form.username)
        .map(|username| username.trim().to_string())
        .unwrap_or_default();

    if !valid_username(&username) {
        return Error::InvalidInput("username".to_string()).into_response();
    }

    match state.controller().issue_token(&username).await {
        Ok(token) => (StatusCode::OK, token.into_string()).into_response(),
        Err(err) => err.into_response(),
    }
}
