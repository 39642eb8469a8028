//! Backend collaborators
//!
//! The application owns no auth server, object store or database logic of
//! its own. It reaches the managed backend through three narrow traits:
//!
//! - [`IdentityProvider`]: sign-up, sign-in, sign-out, current user
//! - [`ObjectStorage`]: attachment uploads returning a public URL
//! - [`TaskStore`]: the `tasks` table, always filtered by owner
//!
//! Implementations:
//!
//! | trait | hosted | in-memory |
//! |-------|--------|-----------|
//! | `IdentityProvider` | [`identity::HostedIdentity`] | [`memory::MemoryIdentity`] |
//! | `ObjectStorage` | [`storage::HostedStorage`] | [`memory::MemoryStorage`] |
//! | `TaskStore` | [`store::PgTaskStore`] | [`memory::MemoryTaskStore`] |
//!
//! The in-memory set backs the test suites and `WORKLOG_BACKEND=memory`.

pub mod identity;
pub mod memory;
pub mod storage;
pub mod store;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::task::{NewTask, Task, TaskChanges};
use crate::models::user::User;

/// Failure reported by a backend collaborator
///
/// `message` is the provider's own wording; callers translate it with
/// [`crate::messages`] before showing it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// HTTP status when the failure came from a remote call
    pub status: Option<u16>,
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(e: sqlx::Error) -> Self {
        Self::new(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Email and password as typed into the auth form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// An authenticated session issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Seconds until `access_token` expires
    #[serde(default)]
    pub expires_in: i64,

    pub user: User,
}

/// Result of a sign-up
///
/// `session` is `None` while the provider waits for the email address to be
/// confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpOutcome {
    pub user: Option<User>,
    pub session: Option<AuthSession>,
}

/// The hosted identity service
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers an account; `redirect_to` is where the confirmation email links
    async fn sign_up(
        &self,
        credentials: &Credentials,
        redirect_to: Option<&str>,
    ) -> BackendResult<SignUpOutcome>;

    async fn sign_in(&self, credentials: &Credentials) -> BackendResult<AuthSession>;

    /// Ends the session that owns `access_token`
    async fn sign_out(&self, access_token: &str) -> BackendResult<()>;

    /// Resolves a token to its user; `Ok(None)` for an invalid or expired token
    async fn get_user(&self, access_token: &str) -> BackendResult<Option<User>>;
}

/// Attachment category; decides the folder under the user's prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Excel,
}

impl AttachmentKind {
    pub fn folder(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "images",
            AttachmentKind::Excel => "excel",
        }
    }
}

/// Storage path for an attachment: `{user_id}/{folder}/{millis}-{file_name}`
pub fn object_path(user_id: Uuid, kind: AttachmentKind, millis: i64, file_name: &str) -> String {
    format!("{}/{}/{}-{}", user_id, kind.folder(), millis, file_name)
}

/// One object to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadObject {
    pub bucket: String,
    pub path: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// The hosted object store
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads as the user owning `access_token` and returns the public URL
    async fn upload(&self, access_token: &str, object: UploadObject) -> BackendResult<String>;
}

/// The `tasks` table
///
/// Every method is scoped by owner. Update and delete report the number of
/// rows affected; zero means the id does not exist or belongs to someone
/// else, which is not an error.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Owner's tasks, newest first
    async fn list_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Task>>;

    async fn insert(&self, task: NewTask) -> BackendResult<Task>;

    async fn update_for_user(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        changes: &TaskChanges,
    ) -> BackendResult<u64>;

    async fn delete_for_user(&self, user_id: Uuid, task_id: Uuid) -> BackendResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path() {
        let user_id = Uuid::parse_str("8c6c3b1a-6f5e-4d7a-9d6b-2f9a3c1e5b7d").unwrap();

        assert_eq!(
            object_path(user_id, AttachmentKind::Image, 1700000000000, "shot.png"),
            "8c6c3b1a-6f5e-4d7a-9d6b-2f9a3c1e5b7d/images/1700000000000-shot.png"
        );
        assert_eq!(
            object_path(user_id, AttachmentKind::Excel, 5, "hours.xlsx"),
            "8c6c3b1a-6f5e-4d7a-9d6b-2f9a3c1e5b7d/excel/5-hours.xlsx"
        );
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::with_status(400, "Invalid login credentials");
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(err.status, Some(400));
    }
}
