//! The interactive login form.

use super::{redirect, safe_next, session_headers, valid_username, BridgeState};
use crate::bridge::Error;
use axum::{
    extract::{Extension, Form, Query},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::form_urlencoded;
use utoipa::{IntoParams, ToSchema};

const INVALID_LOGIN: &str = "Invalid login. Please try again.";
const MISSING_FIELDS: &str = "Username and password are required.";
const UNAVAILABLE: &str = "Login is temporarily unavailable. Please try again later.";

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NextQuery {
    /// Local path to return to after login
    next: Option<String>,
}

#[derive(Deserialize, Default, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn login_form(next: Option<&str>, username: &str, message: Option<&str>) -> Html<String> {
    let action = next.map_or_else(
        || "/login/".to_string(),
        |next| {
            let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
            format!("/login/?next={encoded}")
        },
    );

    let message = message.map_or_else(String::new, |message| {
        format!("<p class=\"error\">{}</p>\n", escape_html(message))
    });

    Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
{message}<form method="post" action="{action}">
<label>Username <input type="text" name="username" value="{username}" autofocus></label>
<label>Password <input type="password" name="password"></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#,
        action = escape_html(&action),
        username = escape_html(username),
    ))
}

fn landing<'a>(state: &'a BridgeState, next: Option<&'a str>) -> &'a str {
    safe_next(next).unwrap_or_else(|| state.config().index_url())
}

#[utoipa::path(
    get,
    path = "/login/",
    params(NextQuery),
    responses(
        (status = 200, description = "Login form", content_type = "text/html", body = String),
        (status = 302, description = "Already authenticated, redirect to next or index")
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state))]
pub async fn login_page(
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    state: Extension<Arc<BridgeState>>,
) -> Response {
    let ctx = state.context(&headers).await;
    let next = safe_next(query.next.as_deref());

    if ctx.is_authenticated() {
        debug!("Already authenticated, skipping login form");
        return redirect(landing(&state, next), HeaderMap::new());
    }

    login_form(next, "", None).into_response()
}

#[utoipa::path(
    post,
    path = "/login/",
    params(NextQuery),
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Logged in, redirect to next or index"),
        (status = 400, description = "Missing username or password", content_type = "text/html", body = String),
        (status = 401, description = "Invalid login", content_type = "text/html", body = String),
        (status = 503, description = "Directory unavailable", content_type = "text/html", body = String)
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state, form))]
pub async fn login_submit(
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    state: Extension<Arc<BridgeState>>,
    form: Option<Form<LoginForm>>,
) -> Response {
    let form = form.map(|Form(form)| form).unwrap_or_default();
    let next = safe_next(query.next.as_deref());
    let mut ctx = state.context(&headers).await;

    let username = form.username.trim();
    if !ctx.is_authenticated() && !username.is_empty() && !valid_username(username) {
        debug!("Rejected malformed username");
        return (StatusCode::UNAUTHORIZED, login_form(next, "", Some(INVALID_LOGIN)))
            .into_response();
    }

    let password = SecretString::from(form.password);

    match state
        .controller()
        .login_with_form(&mut ctx, username, &password)
        .await
    {
        Ok(_) => redirect(
            landing(&state, next),
            session_headers(state.config(), &ctx),
        ),
        Err(Error::InvalidInput(_)) => (
            StatusCode::BAD_REQUEST,
            login_form(next, username, Some(MISSING_FIELDS)),
        )
            .into_response(),
        Err(Error::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            login_form(next, username, Some(INVALID_LOGIN)),
        )
            .into_response(),
        Err(Error::VerifierUnavailable(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            login_form(next, username, Some(UNAVAILABLE)),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x&y")</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn form_carries_next_and_message() {
        let Html(page) = login_form(Some("/a b?c=d"), "<bob>", Some(INVALID_LOGIN));
        assert!(page.contains(r#"action="/login/?next=%2Fa+b%3Fc%3Dd""#));
        assert!(page.contains(r#"value="&lt;bob&gt;""#));
        assert!(page.contains(INVALID_LOGIN));

        let Html(page) = login_form(None, "", None);
        assert!(page.contains(r#"action="/login/""#));
        assert!(!page.contains("class=\"error\""));
    }
}
