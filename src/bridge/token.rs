//! Signed bearer tokens carrying a username claim.
//!
//! Wire format is a compact JWS: `base64url(header).base64url(claims).base64url(mac)`
//! where `mac = HMAC-SHA256(secret, "<header>.<claims>")` and every segment is
//! unpadded base64url. Any token produced by a standard `HS256` JWT encoder with
//! the same secret and a `username` claim decodes here.

use super::directory::Principal;
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{fmt, time::Duration, time::SystemTime};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALG_HS256: &str = "HS256";
const TYP_JWT: &str = "JWT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG_HS256.to_string(),
            typ: Some(TYP_JWT.to_string()),
        }
    }
}

/// Decoded token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// An opaque signed token. The raw value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token secret is not configured")]
    MissingSecret,
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("missing username claim")]
    MissingUsername,
}

/// Issues and verifies tokens with the process-wide shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Option<SecretString>,
    ttl: Option<Duration>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenCodec {
    /// An empty secret counts as no secret.
    #[must_use]
    pub fn new(secret: Option<SecretString>) -> Self {
        Self {
            secret: secret.filter(|s| !s.expose_secret().is_empty()),
            ttl: None,
        }
    }

    /// Add an `exp` claim `ttl` after issuance. `None` or a zero TTL issues
    /// tokens without expiry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl.filter(|ttl| !ttl.is_zero());
        self
    }

    #[must_use]
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        let secret = self.secret.as_ref().ok_or(TokenError::MissingSecret)?;
        HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::MissingSecret)
    }

    /// Mint a token for `principal`.
    ///
    /// # Errors
    /// Returns `TokenError::MissingSecret` when no secret is configured.
    pub fn issue(&self, principal: &Principal) -> Result<Token, TokenError> {
        self.issue_at(principal, now_unix_seconds())
    }

    fn issue_at(&self, principal: &Principal, now: i64) -> Result<Token, TokenError> {
        let mut mac = self.mac()?;

        let claims = Claims {
            username: principal.username().to_string(),
            exp: self.ttl.map(|ttl| {
                now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
            }),
        };

        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(Token(format!("{signing_input}.{signature_b64}")))
    }

    /// Verify `token` and return its claims.
    ///
    /// An empty or whitespace-only token is not a credential and yields
    /// `Ok(None)`; callers must check for it before treating the input as one.
    ///
    /// # Errors
    /// Returns an error if the secret is missing, the token is malformed,
    /// the signature does not match, or the token has expired.
    pub fn decode(&self, token: &str) -> Result<Option<Claims>, TokenError> {
        self.decode_at(token, now_unix_seconds())
    }

    fn decode_at(&self, token: &str, now: i64) -> Result<Option<Claims>, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        let mut mac = self.mac()?;

        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Format)?;
        let claims_b64 = parts.next().ok_or(TokenError::Format)?;
        let signature_b64 = parts.next().ok_or(TokenError::Format)?;
        if parts.next().is_some() {
            return Err(TokenError::Format);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALG_HS256 {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::Base64)?;

        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if claims.username.is_empty() {
            return Err(TokenError::MissingUsername);
        }
        if let Some(exp) = claims.exp {
            if exp <= now {
                return Err(TokenError::Expired);
            }
        }

        Ok(Some(claims))
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
