//! Login / sign-up form
//!
//! One email and password pair, two modes. The status line shows progress
//! while a request is in flight and the translated failure afterwards.

use worklog_shared::backend::AuthSession;
use worklog_shared::messages;

use crate::api::{AuthApi, ClientError, ClientResult, SignUpReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    SignUp,
}

/// What a submit led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A session was issued; go to the dashboard
    SignedIn(AuthSession),

    /// The account exists but the email must be confirmed first
    AwaitingConfirmation,

    /// Nothing changed; the message says why
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    mode: AuthMode,
    email: String,
    password: String,
    message: Option<String>,
    pending: bool,
}

impl AuthForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Switches between login and sign-up, clearing the status line
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::Login,
        };
        self.message = None;
    }

    /// Shows the progress message and marks the form as pending
    ///
    /// `None` while a request is already in flight. Send the request, then
    /// pass the reply to [`AuthForm::finish_submit`].
    pub fn begin_submit(&mut self) -> Option<AuthRequest> {
        if self.pending {
            return None;
        }

        self.pending = true;
        self.message = Some(
            match self.mode {
                AuthMode::Login => messages::LOGGING_IN,
                AuthMode::SignUp => messages::CREATING_ACCOUNT,
            }
            .to_string(),
        );

        Some(AuthRequest {
            mode: self.mode,
            email: self.email.clone(),
            password: self.password.clone(),
        })
    }

    pub fn finish_submit(&mut self, reply: AuthReply) -> AuthOutcome {
        self.pending = false;

        match reply {
            AuthReply::SignIn(Ok(session)) => {
                tracing::info!(user_id = %session.user.id, "Signed in");
                self.message = None;
                AuthOutcome::SignedIn(session)
            }
            AuthReply::SignIn(Err(e)) => {
                self.message = Some(messages::sign_in_failure(&raw_message(&e)));
                AuthOutcome::Failed
            }
            AuthReply::SignUp(Ok(reply)) => match reply.session {
                Some(session) => {
                    self.message = Some(messages::SIGNUP_SUCCESSFUL.to_string());
                    AuthOutcome::SignedIn(session)
                }
                None => {
                    self.message = Some(messages::CONFIRM_EMAIL_SENT.to_string());
                    AuthOutcome::AwaitingConfirmation
                }
            },
            AuthReply::SignUp(Err(e)) => {
                self.message = Some(messages::sign_up_failure(&raw_message(&e)));
                AuthOutcome::Failed
            }
        }
    }

    pub async fn submit(&mut self, auth: &dyn AuthApi) -> AuthOutcome {
        let Some(request) = self.begin_submit() else {
            return AuthOutcome::Failed;
        };

        let reply = request.send(auth).await;
        self.finish_submit(reply)
    }
}

/// Credentials taken from the form for one submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
}

/// What the server answered to an [`AuthRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    SignIn(ClientResult<AuthSession>),
    SignUp(ClientResult<SignUpReply>),
}

impl AuthRequest {
    pub async fn send(&self, auth: &dyn AuthApi) -> AuthReply {
        match self.mode {
            AuthMode::Login => AuthReply::SignIn(auth.sign_in(&self.email, &self.password).await),
            AuthMode::SignUp => AuthReply::SignUp(auth.sign_up(&self.email, &self.password).await),
        }
    }
}

fn raw_message(err: &ClientError) -> String {
    match err {
        ClientError::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
