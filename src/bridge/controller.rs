use super::{
    directory::{Principal, Verifier},
    session::{SessionBinder, SessionContext, SessionId},
    token::{Token, TokenCodec},
    Error,
};
use secrecy::{ExposeSecret, SecretString};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_VERIFIER_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives login, logout and token issuance against an injected directory and
/// session store. Holds no per-request state; every call gets the request's
/// [`SessionContext`].
#[derive(Clone)]
pub struct SessionController {
    codec: TokenCodec,
    verifier: Arc<dyn Verifier>,
    sessions: Arc<dyn SessionBinder>,
    verifier_timeout: Duration,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("codec", &self.codec)
            .field("verifier_timeout", &self.verifier_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    #[must_use]
    pub fn new(
        codec: TokenCodec,
        verifier: Arc<dyn Verifier>,
        sessions: Arc<dyn SessionBinder>,
        verifier_timeout: Duration,
    ) -> Self {
        Self {
            codec,
            verifier,
            sessions,
            verifier_timeout,
        }
    }

    #[must_use]
    pub const fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Resolve the session the request arrived with.
    pub async fn context(&self, id: Option<SessionId>) -> SessionContext {
        let principal = match &id {
            Some(id) => self.sessions.current(id).await,
            None => None,
        };
        SessionContext::new(id, principal)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>> + Send,
    {
        tokio::time::timeout(self.verifier_timeout, call)
            .await
            .map_err(|_| {
                warn!("Directory call exceeded {:?}", self.verifier_timeout);
                Error::VerifierUnavailable("directory timed out".to_string())
            })?
    }

    // a new id on every login, so an id planted before login is never authenticated
    async fn establish(&self, ctx: &mut SessionContext, principal: Principal) {
        if let Some(old) = ctx.clear() {
            self.sessions.unbind(&old).await;
        }
        let id = SessionId::generate();
        self.sessions.bind(&id, principal.clone()).await;
        ctx.authenticate(id, principal);
    }

    /// Authenticate with a username/password pair.
    ///
    /// An already authenticated session is returned as is, without consulting
    /// the directory.
    ///
    /// # Errors
    /// `InvalidInput` for an empty field, otherwise whatever the directory
    /// reports. The context is left untouched on failure.
    #[instrument(skip(self, ctx, password))]
    pub async fn login_with_form(
        &self,
        ctx: &mut SessionContext,
        username: &str,
        password: &SecretString,
    ) -> Result<Principal, Error> {
        if let Some(principal) = ctx.principal() {
            debug!("Session already authenticated as {}", principal.username());
            return Ok(principal.clone());
        }

        if username.is_empty() || password.expose_secret().is_empty() {
            return Err(Error::InvalidInput(
                "username and password are required".to_string(),
            ));
        }

        let principal = self
            .bounded(self.verifier.verify_password(username, password))
            .await?;

        self.establish(ctx, principal.clone()).await;
        info!("User logged in with password: {}", principal.username());

        Ok(principal)
    }

    /// Authenticate with a signed token.
    ///
    /// # Errors
    /// `MissingToken` for an empty token, `InvalidToken` when it does not
    /// verify or no secret is configured (no lookup is attempted), otherwise whatever the directory
    /// reports for the claimed username.
    #[instrument(skip_all)]
    pub async fn login_with_token(
        &self,
        ctx: &mut SessionContext,
        token: &str,
    ) -> Result<Principal, Error> {
        let claims = match self.codec.decode(token) {
            Ok(Some(claims)) => claims,
            Ok(None) => return Err(Error::MissingToken),
            // without a secret nothing verifies; that is a rejected token here,
            // only issuance reports the missing secret as a config error
            Err(e) => {
                debug!("Token rejected: {e}");
                return Err(Error::InvalidToken(e));
            }
        };

        let principal = self.bounded(self.verifier.lookup(&claims.username)).await?;

        self.establish(ctx, principal.clone()).await;
        info!("User logged in with token: {}", principal.username());

        Ok(principal)
    }

    /// End the session. Never fails and is safe to repeat.
    ///
    /// The token, when present, only names who is logging out in the log.
    #[instrument(skip_all)]
    pub async fn logout(&self, ctx: &mut SessionContext, token: Option<&str>) {
        let claimed = token.and_then(|token| match self.codec.decode(token) {
            Ok(claims) => claims.map(|claims| claims.username),
            Err(e) => {
                debug!("Ignoring invalid token on logout: {e}");
                None
            }
        });

        let session_user = ctx.principal().map(|p| p.username().to_string());

        if let Some(id) = ctx.clear() {
            self.sessions.unbind(&id).await;
        }

        match (session_user, claimed) {
            (Some(user), _) | (None, Some(user)) => info!("User logged out: {user}"),
            (None, None) => debug!("Logout without a session"),
        }
    }

    /// Mint a token for a known user.
    ///
    /// # Errors
    /// `NotFound` for an unknown user, `Config` when no secret is configured.
    #[instrument(skip(self))]
    pub async fn issue_token(&self, username: &str) -> Result<Token, Error> {
        let principal = self.bounded(self.verifier.lookup(username)).await?;
        let token = self.codec.issue(&principal)?;
        info!("Issued token for {}", principal.username());
        Ok(token)
    }
}
