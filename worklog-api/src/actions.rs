//! Task server actions
//!
//! Create, update and delete as one unit each, shared by the JSON API and
//! the HTML form targets. Every action runs the same steps in order:
//!
//! 1. check the input shape (id present and well-formed, field lengths)
//! 2. resolve the session through the identity provider
//! 3. call the backend (uploads, then the table)
//! 4. translate a backend failure into a prefixed display message
//!
//! Input checks come first, so a malformed request never reaches the
//! identity provider or the store.
//!
//! Uploads are not rolled back. When the insert fails after an attachment
//! was stored, the object stays in the bucket and its path is logged.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use worklog_shared::auth::middleware::AuthContext;
use worklog_shared::backend::{
    object_path, AttachmentKind, IdentityProvider, ObjectStorage, TaskStore, UploadObject,
};
use worklog_shared::messages::{self, action_failure, ActionStep};
use worklog_shared::models::task::{NewTask, Task, TaskChanges};
use worklog_shared::validation::{FieldError, TaskInput, INVALID_FORM_DATA};

/// Why an action was refused or failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Field lengths out of bounds, title first
    #[error("{}", first_message(.0))]
    Validation(Vec<FieldError>),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Task id is required")]
    MissingId,

    #[error("Invalid task id")]
    InvalidId,

    /// Backend failure, already prefixed with the failing step
    #[error("{0}")]
    Backend(String),
}

fn first_message(errors: &[FieldError]) -> &str {
    errors
        .first()
        .map(|e| e.message.as_str())
        .unwrap_or(INVALID_FORM_DATA)
}

pub type ActionResult<T> = Result<T, ActionError>;

/// A file picked in the create form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Attachment {
    /// Browsers submit an empty part when no file was chosen
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fields of the create form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTaskForm {
    pub title: String,
    pub description: String,
    pub image: Option<Attachment>,
    pub excel: Option<Attachment>,
}

/// The three task mutations plus the owner-scoped list
#[derive(Clone)]
pub struct TaskActions {
    identity: Arc<dyn IdentityProvider>,
    storage: Arc<dyn ObjectStorage>,
    tasks: Arc<dyn TaskStore>,
    bucket: String,
}

impl TaskActions {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        storage: Arc<dyn ObjectStorage>,
        tasks: Arc<dyn TaskStore>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            storage,
            tasks,
            bucket: bucket.into(),
        }
    }

    /// Resolves the caller; any provider failure counts as no session
    pub async fn session(&self, access_token: Option<&str>) -> ActionResult<AuthContext> {
        let token = access_token
            .filter(|t| !t.is_empty())
            .ok_or(ActionError::Unauthorized)?;

        match self.identity.get_user(token).await {
            Ok(Some(user)) => Ok(AuthContext::from_user(&user, token)),
            Ok(None) => Err(ActionError::Unauthorized),
            Err(e) => {
                warn!(error = %e, "Session lookup failed");
                Err(ActionError::Unauthorized)
            }
        }
    }

    /// Caller's tasks, newest first
    pub async fn list(&self, access_token: Option<&str>) -> ActionResult<Vec<Task>> {
        let auth = self.session(access_token).await?;

        self.tasks
            .list_for_user(auth.user_id)
            .await
            .map_err(|e| ActionError::Backend(messages::passthrough(&e.message)))
    }

    /// Validates, uploads attachments, then inserts the row
    pub async fn create(
        &self,
        access_token: Option<&str>,
        form: CreateTaskForm,
    ) -> ActionResult<Task> {
        validate(&form.title, &form.description)?;
        let auth = self.session(access_token).await?;

        let mut uploaded = Vec::new();

        let image_url = match form.image.filter(|a| !a.is_empty()) {
            Some(image) => {
                let (path, url) = self
                    .upload(&auth, AttachmentKind::Image, image)
                    .await
                    .map_err(|e| ActionError::Backend(action_failure(ActionStep::ImageUpload, &e)))?;
                uploaded.push(path);
                Some(url)
            }
            None => None,
        };

        let excel_url = match form.excel.filter(|a| !a.is_empty()) {
            Some(excel) => {
                let (path, url) = self
                    .upload(&auth, AttachmentKind::Excel, excel)
                    .await
                    .map_err(|e| {
                        log_orphans(&self.bucket, &uploaded);
                        ActionError::Backend(action_failure(ActionStep::ExcelUpload, &e))
                    })?;
                uploaded.push(path);
                Some(url)
            }
            None => None,
        };

        let task = self
            .tasks
            .insert(NewTask {
                user_id: auth.user_id,
                title: form.title,
                description: form.description,
                image_url,
                excel_url,
            })
            .await
            .map_err(|e| {
                log_orphans(&self.bucket, &uploaded);
                ActionError::Backend(action_failure(ActionStep::Create, &e.message))
            })?;

        info!(user_id = %auth.user_id, task_id = %task.id, "Task created");
        Ok(task)
    }

    /// Edits title and description; returns rows affected (0 when not owned)
    pub async fn update(
        &self,
        access_token: Option<&str>,
        task_id: &str,
        title: &str,
        description: &str,
    ) -> ActionResult<u64> {
        let task_id = parse_task_id(task_id)?;
        validate(title, description)?;
        let auth = self.session(access_token).await?;

        let changes = TaskChanges {
            title: title.to_string(),
            description: description.to_string(),
        };

        let rows = self
            .tasks
            .update_for_user(auth.user_id, task_id, &changes)
            .await
            .map_err(|e| ActionError::Backend(action_failure(ActionStep::Update, &e.message)))?;

        debug!(user_id = %auth.user_id, task_id = %task_id, rows, "Task updated");
        Ok(rows)
    }

    /// Deletes a task; returns rows affected (0 when not owned)
    pub async fn delete(&self, access_token: Option<&str>, task_id: &str) -> ActionResult<u64> {
        let task_id = parse_task_id(task_id)?;
        let auth = self.session(access_token).await?;

        let rows = self
            .tasks
            .delete_for_user(auth.user_id, task_id)
            .await
            .map_err(|e| ActionError::Backend(action_failure(ActionStep::Delete, &e.message)))?;

        debug!(user_id = %auth.user_id, task_id = %task_id, rows, "Task deleted");
        Ok(rows)
    }

    /// Uploads one attachment; returns its storage path and public URL
    async fn upload(
        &self,
        auth: &AuthContext,
        kind: AttachmentKind,
        attachment: Attachment,
    ) -> Result<(String, String), String> {
        let path = object_path(
            auth.user_id,
            kind,
            Utc::now().timestamp_millis(),
            &attachment.file_name,
        );

        let url = self
            .storage
            .upload(
                &auth.access_token,
                UploadObject {
                    bucket: self.bucket.clone(),
                    path: path.clone(),
                    bytes: attachment.bytes,
                    content_type: attachment.content_type,
                },
            )
            .await
            .map_err(|e| e.message)?;

        Ok((path, url))
    }
}

fn validate(title: &str, description: &str) -> ActionResult<()> {
    let errors = TaskInput::new(title, description).field_errors();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ActionError::Validation(errors))
    }
}

fn parse_task_id(task_id: &str) -> ActionResult<Uuid> {
    if task_id.is_empty() {
        return Err(ActionError::MissingId);
    }
    Uuid::parse_str(task_id).map_err(|_| ActionError::InvalidId)
}

fn log_orphans(bucket: &str, paths: &[String]) {
    for path in paths {
        warn!(bucket, path = %path, "Uploaded object left without a task");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worklog_shared::backend::memory::{MemoryIdentity, MemoryStorage, MemoryTaskStore};
    use worklog_shared::backend::Credentials;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    struct Fixture {
        identity: Arc<MemoryIdentity>,
        storage: Arc<MemoryStorage>,
        store: Arc<MemoryTaskStore>,
        actions: TaskActions,
    }

    fn fixture() -> Fixture {
        let identity = Arc::new(MemoryIdentity::new(SECRET));
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(MemoryTaskStore::new());
        let actions = TaskActions::new(identity.clone(), storage.clone(), store.clone(), "task-files");

        Fixture {
            identity,
            storage,
            store,
            actions,
        }
    }

    async fn sign_up(identity: &MemoryIdentity, email: &str) -> String {
        let credentials = Credentials::new(email, "hunter22");
        identity.sign_up(&credentials, None).await.unwrap();
        identity.sign_in(&credentials).await.unwrap().access_token
    }

    fn form(title: &str, description: &str) -> CreateTaskForm {
        CreateTaskForm {
            title: title.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    fn attachment(name: &str, bytes: &'static [u8]) -> Attachment {
        Attachment {
            file_name: name.to_string(),
            content_type: None,
            bytes: Bytes::from_static(bytes),
        }
    }

    #[tokio::test]
    async fn test_validation_runs_before_session_lookup() {
        let f = fixture();

        let err = f.actions.create(Some("tok"), form("ab", "Valid description")).await.unwrap_err();
        assert_eq!(err.to_string(), "Title must be at least 3 characters");

        let err = f.actions.create(None, form("Valid", "abcd")).await.unwrap_err();
        assert_eq!(err.to_string(), "Task must be at least 5 characters");

        let err = f
            .actions
            .update(Some("tok"), &Uuid::new_v4().to_string(), "ab", "abcd")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Title must be at least 3 characters");

        assert_eq!(f.identity.get_user_calls(), 0);
        assert_eq!(f.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_unauthenticated_actions_mutate_nothing() {
        let f = fixture();
        let id = Uuid::new_v4().to_string();

        assert_eq!(
            f.actions.create(None, form("Valid", "Valid description")).await,
            Err(ActionError::Unauthorized)
        );
        assert_eq!(
            f.actions.update(Some("bogus"), &id, "Valid", "Valid description").await,
            Err(ActionError::Unauthorized)
        );
        assert_eq!(f.actions.delete(Some(""), &id).await, Err(ActionError::Unauthorized));

        assert_eq!(f.store.calls(), 0);
        assert!(f.storage.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_task_id_checks() {
        let f = fixture();

        assert_eq!(f.actions.delete(Some("tok"), "").await, Err(ActionError::MissingId));
        assert_eq!(
            f.actions.update(Some("tok"), "", "Valid", "Valid description").await,
            Err(ActionError::MissingId)
        );
        assert_eq!(
            f.actions.delete(Some("tok"), "not-a-uuid").await,
            Err(ActionError::InvalidId)
        );
        assert_eq!(f.identity.get_user_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_with_attachments() {
        let f = fixture();
        let token = sign_up(&f.identity, "dev@example.com").await;

        let task = f
            .actions
            .create(
                Some(&token),
                CreateTaskForm {
                    image: Some(attachment("shot.png", b"png")),
                    excel: Some(attachment("hours.xlsx", b"xlsx")),
                    ..form("Standup notes", "Wrote the standup notes")
                },
            )
            .await
            .unwrap();

        let image_url = task.image_url.unwrap();
        assert!(image_url.starts_with(&format!("memory://task-files/{}/images/", task.user_id)));
        assert!(image_url.ends_with("-shot.png"));
        assert!(task.excel_url.unwrap().contains("/excel/"));
        assert_eq!(f.storage.paths().await.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_attachments_are_skipped() {
        let f = fixture();
        let token = sign_up(&f.identity, "dev@example.com").await;

        let task = f
            .actions
            .create(
                Some(&token),
                CreateTaskForm {
                    image: Some(attachment("empty.png", b"")),
                    ..form("Standup notes", "Wrote the standup notes")
                },
            )
            .await
            .unwrap();

        assert!(task.image_url.is_none());
        assert!(f.storage.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_is_prefixed() {
        let f = fixture();
        let token = sign_up(&f.identity, "dev@example.com").await;
        f.storage.set_failure(Some("Bucket not found")).await;

        let err = f
            .actions
            .create(
                Some(&token),
                CreateTaskForm {
                    image: Some(attachment("shot.png", b"png")),
                    ..form("Standup notes", "Wrote the standup notes")
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err, ActionError::Backend("Image upload failed: Bucket not found".to_string()));
        assert_eq!(f.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_insert_failure_keeps_uploaded_object() {
        let f = fixture();
        let token = sign_up(&f.identity, "dev@example.com").await;
        f.store.set_failure(Some("duplicate key value")).await;

        let err = f
            .actions
            .create(
                Some(&token),
                CreateTaskForm {
                    excel: Some(attachment("hours.xlsx", b"xlsx")),
                    ..form("Standup notes", "Wrote the standup notes")
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Task creation failed: duplicate key value");
        assert_eq!(f.storage.paths().await.len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_task_is_untouched_but_reports_success() {
        let f = fixture();
        let owner = sign_up(&f.identity, "owner@example.com").await;
        let intruder = sign_up(&f.identity, "intruder@example.com").await;

        let task = f
            .actions
            .create(Some(&owner), form("Owner's entry", "Owner's description"))
            .await
            .unwrap();
        let id = task.id.to_string();

        assert_eq!(
            f.actions.update(Some(&intruder), &id, "Hijacked", "Hijacked text").await,
            Ok(0)
        );
        assert_eq!(f.actions.delete(Some(&intruder), &id).await, Ok(0));

        let tasks = f.actions.list(Some(&owner)).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Owner's entry");
        assert!(f.actions.list(Some(&intruder)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_own_task() {
        let f = fixture();
        let token = sign_up(&f.identity, "dev@example.com").await;
        let task = f
            .actions
            .create(Some(&token), form("First draft", "First description"))
            .await
            .unwrap();
        let id = task.id.to_string();

        assert_eq!(
            f.actions.update(Some(&token), &id, "Second draft", "Second description").await,
            Ok(1)
        );
        let tasks = f.actions.list(Some(&token)).await.unwrap();
        assert_eq!(tasks[0].title, "Second draft");

        assert_eq!(f.actions.delete(Some(&token), &id).await, Ok(1));
        assert!(f.actions.list(Some(&token)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_on_delete() {
        let f = fixture();
        let token = sign_up(&f.identity, "dev@example.com").await;
        f.store.set_failure(Some("")).await;

        let err = f
            .actions
            .delete(Some(&token), &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Task delete failed: Something went wrong. Please try again."
        );
    }
}
