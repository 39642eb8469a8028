/// Worklog server API contract
///
/// The client components talk to the server through three narrow traits so
/// that each can be driven by a fake in tests:
///
/// - [`TaskSource`]: the list and its change feed, used by the grid
/// - [`TaskActions`]: create, update and delete, used by cards and the dialog
/// - [`AuthApi`]: session management, used by the auth form
///
/// [`ApiClient`] implements all three over HTTP.
///
/// # Example
///
/// ```no_run
/// use worklog_client::api::{ApiClient, AuthApi, TaskSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new("http://127.0.0.1:8080")?;
/// client.sign_in("ada@example.com", "secret1").await?;
///
/// for task in client.fetch_tasks().await? {
///     println!("{}", task.title);
/// }
/// # Ok(())
/// # }
/// ```

pub mod http;

pub use http::ApiClient;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worklog_shared::backend::AuthSession;
use worklog_shared::events::ChangeEvent;
use worklog_shared::messages;
use worklog_shared::models::task::Task;

/// Client error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The server answered with an error body
    #[error("{message}")]
    Api { status: u16, message: String },

    /// No session token held
    #[error("Unauthorized")]
    NotSignedIn,

    /// The server could not be reached
    #[error("Request failed: {0}")]
    Transport(String),

    /// The response did not have the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),

    /// A local attachment could not be read
    #[error("Could not read {path}: {message}")]
    File { path: String, message: String },
}

impl ClientError {
    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The sentence shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } => messages::passthrough(message),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Client result type alias
pub type ClientResult<T> = Result<T, ClientError>;

/// One notification from the change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The subscription is live
    Subscribed,

    /// One of the caller's tasks changed
    Change(ChangeEvent),

    /// Events were dropped; refetch
    Resync,
}

/// Live change feed; ends when the server closes it
pub type FeedStream = BoxStream<'static, ClientResult<FeedEvent>>;

/// A file picked for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FileUpload {
    /// Reads a file from disk, naming it after the path's last component
    pub async fn from_path(path: &Path) -> ClientResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ClientError::File {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            content_type: content_type_for(&file_name).map(str::to_string),
            file_name,
            bytes: Bytes::from(bytes),
        })
    }
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_lowercase();

    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "xls" => Some("application/vnd.ms-excel"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "csv" => Some("text/csv"),
        _ => None,
    }
}

/// Create request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTaskForm {
    pub title: String,
    pub description: String,
    pub image: Option<FileUpload>,
    pub excel: Option<FileUpload>,
}

/// Sign-up reply; `session` is absent until the email is confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpReply {
    pub user_id: Option<Uuid>,
    pub session: Option<AuthSession>,
    pub message: String,
}

/// The task list and its change feed
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// The caller's tasks, newest first
    async fn fetch_tasks(&self) -> ClientResult<Vec<Task>>;

    /// Opens the change feed
    async fn changes(&self) -> ClientResult<FeedStream>;
}

/// Task mutations
#[async_trait]
pub trait TaskActions: Send + Sync {
    async fn create_task(&self, form: NewTaskForm) -> ClientResult<Task>;

    /// Returns rows affected
    async fn update_task(&self, task_id: Uuid, title: &str, description: &str)
        -> ClientResult<u64>;

    /// Returns rows affected
    async fn delete_task(&self, task_id: Uuid) -> ClientResult<u64>;
}

/// Session management
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthSession>;

    async fn sign_up(&self, email: &str, password: &str) -> ClientResult<SignUpReply>;

    async fn sign_out(&self) -> ClientResult<()>;
}
