//! Hosted identity provider client
//!
//! Speaks the hosted auth REST API under `{base}/auth/v1`. Every request
//! carries the project's public `apikey`; user-scoped calls add the user's
//! bearer token.
//!
//! # Example
//!
//! ```no_run
//! use worklog_shared::backend::identity::HostedIdentity;
//! use worklog_shared::backend::{Credentials, IdentityProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = HostedIdentity::new("https://project.example.co", "public-anon-key")?;
//! let session = identity
//!     .sign_in(&Credentials::new("dev@example.com", "hunter22"))
//!     .await?;
//! println!("signed in as {}", session.user.id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AuthSession, BackendError, BackendResult, Credentials, IdentityProvider, SignUpOutcome};
use crate::models::user::User;

/// Client for the hosted auth service
#[derive(Debug, Clone)]
pub struct HostedIdentity {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl HostedIdentity {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> BackendResult<Self> {
        Self::with_client(Client::new(), base_url, api_key)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> BackendResult<Self> {
        let base_url = parse_base_url(base_url)?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::new(format!("Invalid backend URL: {}", e)))
    }
}

/// Parses a base URL so that relative joins append to its path
pub(crate) fn parse_base_url(base_url: &str) -> BackendResult<Url> {
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| BackendError::new(format!("Invalid backend URL: {}", e)))
}

/// Sign-up answers with a session when no confirmation is needed, or with
/// the bare user otherwise
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSession),
    User(User),
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn sign_up(
        &self,
        credentials: &Credentials,
        redirect_to: Option<&str>,
    ) -> BackendResult<SignUpOutcome> {
        let mut url = self.endpoint("auth/v1/signup")?;
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }

        debug!("Signing up");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(credentials)
            .send()
            .await?;

        let body: SignUpResponse = ok_json(response).await?;

        Ok(match body {
            SignUpResponse::Session(session) => SignUpOutcome {
                user: Some(session.user.clone()),
                session: Some(session),
            },
            SignUpResponse::User(user) => SignUpOutcome {
                user: Some(user),
                session: None,
            },
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> BackendResult<AuthSession> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        debug!("Signing in");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(credentials)
            .send()
            .await?;

        ok_json(response).await
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        let response = self
            .http
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        // An already-invalid token has nothing left to sign out
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        ensure_success(response).await.map(|_| ())
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<Option<User>> {
        let response = self
            .http
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => ok_json(response).await.map(Some),
        }
    }
}

/// Returns the response when it is 2xx, otherwise the provider's error
pub(crate) async fn ensure_success(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });

    warn!(status = status.as_u16(), %message, "Backend request failed");
    Err(BackendError::with_status(status.as_u16(), message))
}

pub(crate) async fn ok_json<T: serde::de::DeserializeOwned>(response: Response) -> BackendResult<T> {
    let response = ensure_success(response).await?;
    Ok(response.json().await?)
}

/// First of `msg`, `error_description`, `message`, `error` in a JSON body
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    ["msg", "error_description", "message", "error"]
        .iter()
        .filter_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string)
}
