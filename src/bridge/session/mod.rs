//! Server-side sessions and the per-request session context.

mod memory;

pub use memory::{MemorySessions, MAX_SESSION_TTL};

use super::directory::Principal;
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::fmt;

const SESSION_ID_BYTES: usize = 32;

/// An opaque session identifier, carried in the session cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(Base64UrlUnpadded::encode_string(&bytes))
    }

    /// Accept a cookie value only if it has the shape of a generated id.
    #[must_use]
    pub fn from_cookie(value: &str) -> Option<Self> {
        let value = value.trim();
        let decoded = Base64UrlUnpadded::decode_vec(value).ok()?;
        (decoded.len() == SESSION_ID_BYTES).then(|| Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(***)")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

/// The session state of the request being handled.
///
/// Built by the controller from the request cookie, mutated by login and
/// logout, and read back by the handler to decide which cookie to send.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    id: Option<SessionId>,
    state: SessionState,
    changed: bool,
}

impl SessionContext {
    #[must_use]
    pub fn new(id: Option<SessionId>, principal: Option<Principal>) -> Self {
        Self {
            id,
            state: principal.map_or(SessionState::Anonymous, SessionState::Authenticated),
            changed: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        match &self.state {
            SessionState::Authenticated(principal) => Some(principal),
            SessionState::Anonymous => None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// True once login or logout replaced the binding this request arrived with.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn authenticate(&mut self, id: SessionId, principal: Principal) {
        self.id = Some(id);
        self.state = SessionState::Authenticated(principal);
        self.changed = true;
    }

    pub(crate) fn clear(&mut self) -> Option<SessionId> {
        self.state = SessionState::Anonymous;
        self.changed = true;
        self.id.take()
    }
}

/// Stores which principal, if any, each session id is bound to.
#[async_trait]
pub trait SessionBinder: Send + Sync {
    async fn current(&self, id: &SessionId) -> Option<Principal>;

    async fn bind(&self, id: &SessionId, principal: Principal);

    async fn unbind(&self, id: &SessionId);
}
