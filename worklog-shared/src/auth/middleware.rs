//! Session credentials carried on HTTP requests
//!
//! Browsers carry the access token in the `worklog-access-token` cookie set
//! at sign-in. Programmatic clients send `Authorization: Bearer <token>`.
//! The bearer header wins when both are present.
//!
//! Resolving the token to a user is the identity provider's job (see
//! [`crate::backend::IdentityProvider::get_user`]); this module only finds
//! the raw token and builds the cookies.
//!
//! # Example
//!
//! ```
//! use axum::http::{header, HeaderMap, HeaderValue};
//! use worklog_shared::auth::middleware::extract_access_token;
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; worklog-access-token=abc"));
//!
//! assert_eq!(extract_access_token(&headers).as_deref(), Some("abc"));
//! ```

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::User;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "worklog-access-token";

/// Authenticated request context
///
/// Built after the identity provider accepted the token. Handlers pass
/// `access_token` on to storage calls so uploads run as the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    pub email: Option<String>,

    #[serde(skip_serializing)]
    pub access_token: String,
}

impl AuthContext {
    pub fn from_user(user: &User, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            access_token: access_token.into(),
        }
    }
}

/// Finds the access token in the bearer header or the session cookie
///
/// Empty values count as absent.
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// `Set-Cookie` value that stores a session token
pub fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}
