//! An HTTP user directory.
//!
//! `POST {base}/verify` with `{"username", "password"}` and
//! `GET {base}/users/{username}` both answer `200` with the user record as a
//! JSON object.

use super::{Principal, Verifier};
use crate::{bridge::Error, APP_USER_AGENT};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub struct RemoteDirectory {
    client: Client,
    base_url: Url,
}

impl RemoteDirectory {
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(anyhow!("Error parsing URL: unsupported scheme {scheme}")),
        }

        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Error parsing URL: {base_url} cannot be a base"));
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config("directory URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn principal(response: Response, username: &str) -> Result<Principal, Error> {
        let record: Value = response.json().await.map_err(|e| {
            error!("Invalid directory response: {e}");
            Error::VerifierUnavailable("invalid directory response".to_string())
        })?;

        if !record.is_object() {
            error!("Directory response is not a JSON object");
            return Err(Error::VerifierUnavailable(
                "invalid directory response".to_string(),
            ));
        }

        // the record may omit the name but never substitute another user
        if let Some(reported) = record.get("username") {
            if reported.as_str() != Some(username) {
                error!("Directory answered for a different user than {username}");
                return Err(Error::VerifierUnavailable(
                    "directory returned a different user".to_string(),
                ));
            }
        }

        Ok(Principal::new(username, record))
    }
}

fn unavailable(e: &reqwest::Error) -> Error {
    error!("Directory request failed: {e}");
    Error::VerifierUnavailable(if e.is_timeout() {
        "directory timed out".to_string()
    } else {
        "directory unreachable".to_string()
    })
}

fn unexpected(status: StatusCode) -> Error {
    error!("Unexpected directory response: {status}");
    Error::VerifierUnavailable(format!("directory returned {status}"))
}

#[async_trait]
impl Verifier for RemoteDirectory {
    #[instrument(skip(self, password))]
    async fn verify_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Principal, Error> {
        let url = self.endpoint(&["verify"])?;

        let response = self
            .client
            .post(url)
            .json(&json!({
                "username": username,
                "password": password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| unavailable(&e))?;

        match response.status() {
            StatusCode::OK => Self::principal(response, username).await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!("Directory rejected credentials: {}", response.status());
                Err(Error::InvalidCredentials)
            }
            status => Err(unexpected(status)),
        }
    }

    #[instrument(skip(self))]
    async fn lookup(&self, username: &str) -> Result<Principal, Error> {
        let url = self.endpoint(&["users", username])?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(&e))?;

        match response.status() {
            StatusCode::OK => Self::principal(response, username).await,
            StatusCode::NOT_FOUND => Err(Error::NotFound(username.to_string())),
            status => Err(unexpected(status)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::StatusCode as AxumStatus,
        routing::{get, post},
        Json, Router,
    };
    use tokio::net::TcpListener;

    async fn verify(Json(body): Json<Value>) -> Result<Json<Value>, AxumStatus> {
        match (body["username"].as_str(), body["password"].as_str()) {
            (Some("alice"), Some("alice-password")) => {
                Ok(Json(json!({"username": "alice", "email": "alice@example.com"})))
            }
            (Some("down"), _) => Err(AxumStatus::INTERNAL_SERVER_ERROR),
            _ => Err(AxumStatus::UNAUTHORIZED),
        }
    }

    async fn user(Path(username): Path<String>) -> Result<Json<Value>, AxumStatus> {
        match username.as_str() {
            "alice" => Ok(Json(json!({"username": "alice"}))),
            "a b/c" => Ok(Json(json!({"id": 7}))),
            "broken" => Ok(Json(json!(["not", "an", "object"]))),
            "mallory" => Ok(Json(json!({"username": "alice"}))),
            _ => Err(AxumStatus::NOT_FOUND),
        }
    }

    async fn spawn_directory() -> String {
        let app = Router::new()
            .route("/api/verify", post(verify))
            .route("/api/users/:username", get(user));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/")
    }

    #[test]
    fn rejects_bad_base_urls() {
        let timeout = Duration::from_secs(1);
        assert!(RemoteDirectory::new("not a url", timeout).is_err());
        assert!(RemoteDirectory::new("ftp://example.com", timeout).is_err());
        assert!(RemoteDirectory::new("mailto:alice@example.com", timeout).is_err());
        assert!(RemoteDirectory::new("https://directory.example.com/api", timeout).is_ok());
    }

    #[test]
    fn endpoint_escapes_username() -> Result<()> {
        let directory =
            RemoteDirectory::new("https://directory.example.com/api/", Duration::from_secs(1))?;
        let url = directory.endpoint(&["users", "a b/c"])?;
        assert_eq!(
            url.as_str(),
            "https://directory.example.com/api/users/a%20b%2Fc"
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_and_lookup() -> Result<()> {
        let base = spawn_directory().await;
        let directory = RemoteDirectory::new(&base, Duration::from_secs(5))?;

        let alice = directory
            .verify_password("alice", &SecretString::from("alice-password"))
            .await?;
        assert_eq!(alice.username(), "alice");
        assert_eq!(alice.record()["email"], "alice@example.com");

        let wrong = directory
            .verify_password("alice", &SecretString::from("nope"))
            .await;
        assert!(matches!(wrong, Err(Error::InvalidCredentials)));

        let down = directory
            .verify_password("down", &SecretString::from("x"))
            .await;
        assert!(matches!(down, Err(Error::VerifierUnavailable(_))));

        assert_eq!(directory.lookup("alice").await?.username(), "alice");
        assert_eq!(directory.lookup("a b/c").await?.username(), "a b/c");
        assert!(matches!(
            directory.lookup("carol").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            directory.lookup("broken").await,
            Err(Error::VerifierUnavailable(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn lookup_rejects_a_substituted_user() -> Result<()> {
        let base = spawn_directory().await;
        let directory = RemoteDirectory::new(&base, Duration::from_secs(5))?;

        assert!(matches!(
            directory.lookup("mallory").await,
            Err(Error::VerifierUnavailable(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_directory_is_unavailable() -> Result<()> {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let directory = RemoteDirectory::new(&format!("http://{addr}/"), Duration::from_secs(2))?;
        assert!(matches!(
            directory.lookup("alice").await,
            Err(Error::VerifierUnavailable(_))
        ));
        Ok(())
    }
}
