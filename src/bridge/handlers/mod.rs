pub mod health;
pub use self::health::health;

pub mod login;
pub use self::login::{login_page, login_submit};

pub mod auth;
pub use self::auth::{auth_logout, auth_token, issue_token};

// common functions for the handlers
use super::{
    controller::SessionController,
    session::{SessionContext, SessionId},
};
use axum::{
    http::{
        header::{InvalidHeaderValue, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::error;

pub const SESSION_COOKIE_NAME: &str = "authbridge_session";

const DEFAULT_SESSION_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_INDEX_URL: &str = "/";

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    index_url: String,
    session_ttl_seconds: u64,
    session_cookie_secure: bool,
    trusted_issuers: Vec<IpAddr>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
            trusted_issuers: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_index_url(mut self, index_url: String) -> Self {
        self.index_url = index_url;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_trusted_issuers(mut self, issuers: Vec<IpAddr>) -> Self {
        self.trusted_issuers = issuers;
        self
    }

    #[must_use]
    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    #[must_use]
    pub const fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub const fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn is_trusted_issuer(&self, ip: IpAddr) -> bool {
        self.trusted_issuers.contains(&ip.to_canonical())
    }
}

/// Shared by every handler through an `Extension<Arc<BridgeState>>`.
#[derive(Debug)]
pub struct BridgeState {
    controller: SessionController,
    config: BridgeConfig,
}

impl BridgeState {
    #[must_use]
    pub const fn new(controller: SessionController, config: BridgeConfig) -> Self {
        Self { controller, config }
    }

    #[must_use]
    pub const fn controller(&self) -> &SessionController {
        &self.controller
    }

    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Resolve the session named by the request cookie, if any.
    pub async fn context(&self, headers: &HeaderMap) -> SessionContext {
        self.controller.context(extract_session_id(headers)).await
    }
}

pub fn valid_username(username: &str) -> bool {
    // 1 to 64 characters, no control characters
    Regex::new(r"^[^\p{Cc}]{1,64}$").map_or(false, |re| re.is_match(username))
}

/// Accept `next` only when it stays on this host.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim)
        .filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
}

fn extract_session_id(headers: &HeaderMap) -> Option<SessionId> {
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME)
            .then(|| SessionId::from_cookie(val))
            .flatten()
    })
}

fn session_cookie(config: &BridgeConfig, id: &SessionId) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        id.as_str(),
        config.session_ttl_seconds()
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &BridgeConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// The `Set-Cookie` header reflecting what login or logout did to `ctx`.
fn session_headers(config: &BridgeConfig, ctx: &SessionContext) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if !ctx.changed() {
        return headers;
    }

    let cookie = match ctx.id() {
        Some(id) if ctx.is_authenticated() => session_cookie(config, id),
        _ => clear_session_cookie(config),
    };

    match cookie {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }

    headers
}

fn redirect(location: &str, mut headers: HeaderMap) -> Response {
    match HeaderValue::from_str(location) {
        Ok(location) => {
            headers.insert(LOCATION, location);
            (StatusCode::FOUND, headers).into_response()
        }
        Err(err) => {
            error!("Invalid redirect location: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, headers).into_response()
        }
    }
}
