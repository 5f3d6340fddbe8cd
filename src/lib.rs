//! # authbridge (session and token authentication bridge)
//!
//! `authbridge` puts a server-side session in front of an external user
//! directory. A user is authenticated either with a username/password form or
//! with a signed bearer token, and trusted callers can mint a token for a known
//! user.
//!
//! ## Tokens
//!
//! Tokens are compact `HS256` JWTs whose claims carry a single `username`.
//! Validity is purely a function of the signature and the process-wide secret;
//! nothing is persisted server side. An optional `exp` claim is added only when
//! a token TTL is configured.
//!
//! ## Sessions
//!
//! Every successful login binds the resolved principal to a fresh session id,
//! carried in an `HttpOnly` cookie. Logout always succeeds and always clears the
//! binding, even when the supplied token is invalid.
//!
//! ## Directory
//!
//! The user store is external. The bridge only consumes two capabilities:
//! verify a username/password pair, and look a user up by name.

pub mod bridge;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
