/// Authentication endpoints
///
/// Thin wrappers over the identity provider. Sessions are returned in the
/// body and also set as the `worklog-access-token` cookie, so browser pages
/// and bearer clients share one code path.
///
/// # Endpoints
///
/// - `POST /v1/auth/sign-up` - Register a new account
/// - `POST /v1/auth/sign-in` - Sign in with email and password
/// - `POST /v1/auth/sign-out` - End the current session
/// - `GET /v1/auth/session` - Current user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::{AccessToken, CurrentSession},
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worklog_shared::{
    auth::{
        jwt::ACCESS_TOKEN_LIFETIME_HOURS,
        middleware::{clear_session_cookie, session_cookie, AuthContext},
    },
    backend::{AuthSession, BackendError, Credentials},
    messages,
};

/// Email and password, as typed
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

impl From<CredentialsRequest> for Credentials {
    fn from(req: CredentialsRequest) -> Self {
        Credentials::new(req.email, req.password)
    }
}

/// Sign-up response
///
/// `session` is absent while the provider waits for the email address to be
/// confirmed; `message` tells the user which case applies.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub user_id: Option<Uuid>,

    pub session: Option<AuthSession>,

    pub message: String,
}

/// Register a new account
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/sign-up
/// Content-Type: application/json
///
/// { "email": "user@example.com", "password": "secret1" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Account already exists
/// - `400 Bad Request`: Provider rejected the input
/// - `502 Bad Gateway`: Provider unavailable
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Response> {
    let credentials = Credentials::from(req);
    let redirect_to = state.config.auth_callback_url();

    let outcome = state
        .identity
        .sign_up(&credentials, Some(&redirect_to))
        .await
        .map_err(sign_up_error)?;

    let user_id = outcome
        .user
        .as_ref()
        .or(outcome.session.as_ref().map(|s| &s.user))
        .map(|u| u.id);

    tracing::info!(
        user_id = ?user_id,
        confirmed = outcome.session.is_some(),
        "Account created"
    );

    let cookie = outcome
        .session
        .as_ref()
        .map(|session| session_cookie_for(&state, session));

    let message = if outcome.session.is_some() {
        messages::SIGNUP_SUCCESSFUL
    } else {
        messages::CONFIRM_EMAIL_SENT
    };

    let body = Json(SignUpResponse {
        user_id,
        session: outcome.session,
        message: message.to_string(),
    });

    Ok((
        StatusCode::CREATED,
        AppendHeaders(cookie.map(|c| (header::SET_COOKIE, c))),
        body,
    )
        .into_response())
}

/// Sign in with email and password
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/sign-in
/// Content-Type: application/json
///
/// { "email": "user@example.com", "password": "secret1" }
/// ```
///
/// # Response
///
/// The provider session (`access_token`, `refresh_token`, `expires_in`,
/// `user`) plus a `Set-Cookie` header.
///
/// # Errors
///
/// - `401 Unauthorized`: `Invalid email or password.` or
///   `Please confirm your email before logging in.`
/// - `502 Bad Gateway`: Provider unavailable
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Response> {
    let credentials = Credentials::from(req);

    let session = state
        .identity
        .sign_in(&credentials)
        .await
        .map_err(sign_in_error)?;

    tracing::info!(user_id = %session.user.id, "User signed in");

    let cookie = session_cookie_for(&state, &session);
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Json(session)).into_response())
}

/// End the current session
///
/// Always succeeds: a missing or already revoked token still clears the
/// cookie.
pub async fn sign_out(State(state): State<AppState>, token: AccessToken) -> Response {
    if let Some(token) = token.as_deref() {
        if let Err(e) = state.identity.sign_out(token).await {
            tracing::warn!(error = %e, "Sign-out failed at the identity provider");
        }
    }

    (
        StatusCode::NO_CONTENT,
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(state.secure_cookies()),
        )]),
    )
        .into_response()
}

/// Current user
///
/// # Errors
///
/// - `401 Unauthorized`: No session, or the token is no longer valid
pub async fn session(CurrentSession(auth): CurrentSession) -> Json<AuthContext> {
    Json(auth)
}

/// Cookie carrying a fresh session's access token
pub(crate) fn session_cookie_for(state: &AppState, session: &AuthSession) -> String {
    let max_age = if session.expires_in > 0 {
        session.expires_in
    } else {
        ACCESS_TOKEN_LIFETIME_HOURS * 3600
    };

    session_cookie(&session.access_token, max_age, state.secure_cookies())
}

/// Provider sign-in failure as shown to the user
pub(crate) fn sign_in_error(err: BackendError) -> ApiError {
    let message = messages::sign_in_failure(&err.message);

    match err.status {
        Some(400..=499) => ApiError::Unauthorized(message),
        _ => ApiError::Upstream(message),
    }
}

/// Provider sign-up failure as shown to the user
pub(crate) fn sign_up_error(err: BackendError) -> ApiError {
    let message = messages::sign_up_failure(&err.message);

    if message == messages::ACCOUNT_EXISTS {
        return ApiError::Conflict(message);
    }

    match err.status {
        Some(400..=499) => ApiError::BadRequest(message),
        _ => ApiError::Upstream(message),
    }
}
