//! The external user directory boundary.
//!
//! The bridge never owns user records. It consumes two capabilities from
//! whatever identity store the host runs: verify a username/password pair, and
//! resolve a trusted username (one taken from a verified token) to a user.

mod file;
mod remote;

pub use file::{hash_password, StaticDirectory};
pub use remote::RemoteDirectory;

use super::Error;
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;

/// A resolved, authenticated identity.
///
/// `record` is the directory's full user record, passed through untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Principal {
    username: String,
    record: Arc<Value>,
}

impl Principal {
    #[must_use]
    pub fn new(username: impl Into<String>, record: Value) -> Self {
        Self {
            username: username.into(),
            record: Arc::new(record),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn record(&self) -> &Value {
        &self.record
    }
}

#[async_trait]
pub trait Verifier: Send + Sync {
    /// # Errors
    /// `Error::InvalidCredentials` when the pair does not match a user,
    /// `Error::VerifierUnavailable` when the store cannot be reached.
    async fn verify_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Principal, Error>;

    /// # Errors
    /// `Error::NotFound` when no user has this name,
    /// `Error::VerifierUnavailable` when the store cannot be reached.
    async fn lookup(&self, username: &str) -> Result<Principal, Error>;
}
