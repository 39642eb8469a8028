//! Session extractors
//!
//! - [`AccessToken`]: the raw token from the bearer header or session
//!   cookie, if any. Never rejects; actions decide what a missing token
//!   means after checking their input.
//! - [`CurrentSession`]: the caller resolved through the identity provider.
//!   Rejects with `401 Unauthorized`.
//!
//! # Example
//!
//! ```no_run
//! use worklog_api::middleware::session::CurrentSession;
//!
//! async fn whoami(CurrentSession(auth): CurrentSession) -> String {
//!     format!("user {}", auth.user_id)
//! }
//! ```

use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use worklog_shared::auth::middleware::{extract_access_token, AuthContext};

use crate::{app::AppState, error::ApiError};

/// Raw access token carried by the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub Option<String>);

impl AccessToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AccessToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AccessToken(extract_access_token(&parts.headers)))
    }
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentSession(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_access_token(&parts.headers);

        let auth = state.actions.session(token.as_deref()).await?;
        Ok(CurrentSession(auth))
    }
}
