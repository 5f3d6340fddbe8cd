//! Users loaded from a JSON file of argon2 PHC hashes.
//!
//! ```json
//! [
//!   {"username": "alice", "password_hash": "$argon2id$v=19$...", "attributes": {"email": "alice@example.com"}}
//! ]
//! ```

use super::{Principal, Verifier};
use crate::bridge::Error;
use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::{collections::HashMap, fs, path::Path, sync::Arc};
use tracing::{debug, error, instrument};

#[derive(Deserialize)]
struct UserEntry {
    username: String,
    password_hash: String,
    #[serde(default)]
    attributes: Map<String, Value>,
}

struct StoredUser {
    password_hash: String,
    principal: Principal,
}

pub struct StaticDirectory {
    users: HashMap<String, StoredUser>,
    // verified against when the username is unknown, so response time does not
    // reveal which usernames exist
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for StaticDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticDirectory")
            .field("users", &self.users.len())
            .finish_non_exhaustive()
    }
}

/// Hash a password into an argon2id PHC string.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_hash(hash: &str, plain: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

impl StaticDirectory {
    /// Parse a users file body.
    ///
    /// # Errors
    /// Returns an error on invalid JSON, duplicate or empty usernames, or a
    /// `password_hash` that is not a PHC string.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<UserEntry> = serde_json::from_str(json).context("Invalid users JSON")?;

        let mut users = HashMap::with_capacity(entries.len());
        for entry in entries {
            let username = entry.username.trim().to_string();
            if username.is_empty() {
                return Err(anyhow!("users file contains an empty username"));
            }
            PasswordHash::new(&entry.password_hash)
                .map_err(|e| anyhow!("invalid password_hash for {username}: {e}"))?;

            let mut record = entry.attributes;
            record.insert("username".to_string(), json!(username));

            let stored = StoredUser {
                password_hash: entry.password_hash,
                principal: Principal::new(username.clone(), Value::Object(record)),
            };
            if users.insert(username.clone(), stored).is_some() {
                return Err(anyhow!("duplicate username in users file: {username}"));
            }
        }

        let dummy_hash = hash_password("authbridge-dummy-password")?;

        Ok(Self {
            users,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Load a users file from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read users file: {}", path.display()))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Verifier for StaticDirectory {
    #[instrument(skip(self, password))]
    async fn verify_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Principal, Error> {
        let stored = self.users.get(username);
        let hash: Arc<str> = stored.map_or_else(
            || self.dummy_hash.clone(),
            |user| Arc::from(user.password_hash.as_str()),
        );
        let password = password.clone();

        // argon2 is deliberately slow, keep it off the async workers
        let matched =
            tokio::task::spawn_blocking(move || verify_hash(&hash, password.expose_secret()))
                .await
                .map_err(|e| {
                    error!("Password verification task failed: {e}");
                    Error::VerifierUnavailable("password verification failed".to_string())
                })?;

        match stored {
            Some(user) if matched => Ok(user.principal.clone()),
            _ => {
                debug!("Password verification failed");
                Err(Error::InvalidCredentials)
            }
        }
    }

    #[instrument(skip(self))]
    async fn lookup(&self, username: &str) -> Result<Principal, Error> {
        self.users
            .get(username)
            .map(|user| user.principal.clone())
            .ok_or_else(|| Error::NotFound(username.to_string()))
    }
}
