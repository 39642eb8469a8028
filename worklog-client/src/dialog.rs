//! Create-task dialog
//!
//! Collects title, description and optional attachments, checks the field
//! lengths locally, then creates the task. A successful submit resets and
//! closes the dialog; a failed one keeps every field and shows the error.

use std::path::PathBuf;

use worklog_shared::models::task::Task;
use worklog_shared::validation::{FieldError, TaskInput};

use crate::api::{ClientResult, FileUpload, NewTaskForm, TaskActions};

#[derive(Debug, Clone, Default)]
pub struct CreateTaskDialog {
    open: bool,
    title: String,
    description: String,
    image: Option<PathBuf>,
    excel: Option<PathBuf>,
    field_errors: Vec<FieldError>,
    submit_error: Option<String>,
    submitting: bool,
}

impl CreateTaskDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Hides the dialog; typed fields survive until a successful submit
    pub fn close(&mut self) {
        self.open = false;
        self.submit_error = None;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_image(&mut self, path: Option<PathBuf>) {
        self.image = path;
    }

    pub fn set_excel(&mut self, path: Option<PathBuf>) {
        self.excel = path;
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    /// Message for one field (`title` or `description`) after a failed check
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Checks field lengths; returns whether the form may be submitted
    pub fn validate(&mut self) -> bool {
        self.field_errors = TaskInput::new(self.title.clone(), self.description.clone()).field_errors();
        self.field_errors.is_empty()
    }

    /// Validates and marks the dialog as submitting
    ///
    /// `None` when a field is invalid or a submit is already pending. Send
    /// the request, then pass the result to [`CreateTaskDialog::finish_submit`].
    pub fn begin_submit(&mut self) -> Option<PendingCreate> {
        if self.submitting || !self.validate() {
            return None;
        }

        self.submitting = true;
        self.submit_error = None;
        Some(PendingCreate {
            title: self.title.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            excel: self.excel.clone(),
        })
    }

    /// Resets and closes on success; keeps every field and shows the error otherwise
    pub fn finish_submit(&mut self, result: ClientResult<Task>) -> Option<Task> {
        self.submitting = false;

        match result {
            Ok(task) => {
                tracing::info!(task_id = %task.id, "Task created");
                *self = Self::default();
                Some(task)
            }
            Err(e) => {
                self.submit_error = Some(e.user_message());
                None
            }
        }
    }

    /// Creates the task; returns it on success
    pub async fn submit(&mut self, actions: &dyn TaskActions) -> Option<Task> {
        let request = self.begin_submit()?;
        let result = request.send(actions).await;
        self.finish_submit(result)
    }
}

/// A create request in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCreate {
    pub title: String,
    pub description: String,
    pub image: Option<PathBuf>,
    pub excel: Option<PathBuf>,
}

impl PendingCreate {
    /// Reads the attachments and creates the task
    pub async fn send(&self, actions: &dyn TaskActions) -> ClientResult<Task> {
        let image = match &self.image {
            Some(path) => Some(FileUpload::from_path(path).await?),
            None => None,
        };
        let excel = match &self.excel {
            Some(path) => Some(FileUpload::from_path(path).await?),
            None => None,
        };

        actions
            .create_task(NewTaskForm {
                title: self.title.clone(),
                description: self.description.clone(),
                image,
                excel,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct CreatingActions {
        forms: Mutex<Vec<NewTaskForm>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl TaskActions for CreatingActions {
        async fn create_task(&self, form: NewTaskForm) -> ClientResult<Task> {
            let task = Task {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                title: form.title.clone(),
                description: Some(form.description.clone()),
                image_url: None,
                excel_url: None,
                created_at: Utc::now(),
            };
            self.forms.lock().unwrap().push(form);

            match &self.fail_with {
                Some(message) => Err(ClientError::Api {
                    status: 502,
                    message: message.clone(),
                }),
                None => Ok(task),
            }
        }

        async fn update_task(&self, _id: Uuid, _title: &str, _description: &str) -> ClientResult<u64> {
            unreachable!("the dialog never updates")
        }

        async fn delete_task(&self, _id: Uuid) -> ClientResult<u64> {
            unreachable!("the dialog never deletes")
        }
    }

    #[tokio::test]
    async fn test_invalid_fields_are_not_sent() {
        let actions = CreatingActions::default();
        let mut dialog = CreateTaskDialog::new();
        dialog.open();
        dialog.set_title("ab");
        dialog.set_description("abc");

        assert!(dialog.submit(&actions).await.is_none());
        assert_eq!(dialog.field_error("title"), Some("Title must be at least 3 characters"));
        assert_eq!(
            dialog.field_error("description"),
            Some("Task must be at least 5 characters")
        );
        assert!(actions.forms.lock().unwrap().is_empty());
        assert!(dialog.is_open());
    }

    #[tokio::test]
    async fn test_successful_submit_resets_and_closes() {
        let actions = CreatingActions::default();
        let mut dialog = CreateTaskDialog::new();
        dialog.open();
        dialog.set_title("Deploy");
        dialog.set_description("Shipped version 2");

        let task = dialog.submit(&actions).await.unwrap();

        assert_eq!(task.title, "Deploy");
        assert!(!dialog.is_open());
        assert_eq!(dialog.title(), "");
        assert!(dialog.field_error("title").is_none());
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_fields() {
        let actions = CreatingActions {
            fail_with: Some("Image upload failed: Payload too large".to_string()),
            ..Default::default()
        };
        let mut dialog = CreateTaskDialog::new();
        dialog.open();
        dialog.set_title("Deploy");
        dialog.set_description("Shipped version 2");

        assert!(dialog.submit(&actions).await.is_none());
        assert_eq!(
            dialog.submit_error(),
            Some("Image upload failed: Payload too large")
        );
        assert!(dialog.is_open());
        assert_eq!(dialog.title(), "Deploy");
        assert!(!dialog.is_submitting());
    }

    #[tokio::test]
    async fn test_attachment_is_read_from_disk() {
        let path = std::env::temp_dir().join(format!("worklog-{}.png", Uuid::new_v4()));
        tokio::fs::write(&path, b"png").await.unwrap();

        let actions = CreatingActions::default();
        let mut dialog = CreateTaskDialog::new();
        dialog.set_title("Deploy");
        dialog.set_description("Shipped version 2");
        dialog.set_image(Some(path.clone()));

        assert!(dialog.submit(&actions).await.is_some());
        let forms = actions.forms.lock().unwrap();
        let image = forms[0].image.as_ref().unwrap();
        assert_eq!(&image.bytes[..], b"png");
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
        assert!(forms[0].excel.is_none());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_attachment_is_a_submit_error() {
        let actions = CreatingActions::default();
        let mut dialog = CreateTaskDialog::new();
        dialog.set_title("Deploy");
        dialog.set_description("Shipped version 2");
        dialog.set_excel(Some(PathBuf::from("/nonexistent/report.xlsx")));

        assert!(dialog.submit(&actions).await.is_none());
        assert!(dialog.submit_error().unwrap().starts_with("Could not read"));
        assert!(actions.forms.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pending_submit_is_visible_and_exclusive() {
        let mut dialog = CreateTaskDialog::new();
        dialog.open();
        dialog.set_title("Deploy");
        dialog.set_description("Shipped version 2");

        let request = dialog.begin_submit().unwrap();
        assert!(dialog.is_submitting());
        assert_eq!(request.title, "Deploy");
        assert!(dialog.begin_submit().is_none());

        let failed = dialog.finish_submit(Err(ClientError::Transport("timed out".to_string())));
        assert!(failed.is_none());
        assert!(!dialog.is_submitting());
        assert_eq!(dialog.submit_error(), Some("Request failed: timed out"));
        assert!(dialog.begin_submit().is_some());
    }
}
