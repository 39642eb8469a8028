//! Task card
//!
//! One task in the grid, toggling between a read-only view and an edit form.
//! Drafts live only on the card: cancelling throws them away and nothing is
//! sent to the server until `save`.
//!
//! ```text
//!   View ──begin_edit──> Edit ──save ok──> View
//!    ^                    │  └─save err──> Edit (error shown)
//!    └────cancel_edit─────┘
//! ```

use uuid::Uuid;
use worklog_shared::models::task::{Task, TaskChanges};

use crate::api::{ClientResult, TaskActions};

/// Confirmation asked before a delete
pub const DELETE_PROMPT: &str = "Delete this log?";

/// Asks the user a yes/no question
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardMode {
    View,
    Edit,
}

#[derive(Debug, Clone)]
pub struct TaskCard {
    task: Task,
    mode: CardMode,
    draft_title: String,
    draft_description: String,
    error: Option<String>,
    saving: bool,
    deleting: bool,
}

impl TaskCard {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            mode: CardMode::View,
            draft_title: String::new(),
            draft_description: String::new(),
            error: None,
            saving: false,
            deleting: false,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn id(&self) -> Uuid {
        self.task.id
    }

    pub fn mode(&self) -> CardMode {
        self.mode
    }

    pub fn draft_title(&self) -> &str {
        &self.draft_title
    }

    pub fn draft_description(&self) -> &str {
        &self.draft_description
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    /// Adopts a fresher copy of the task from the grid; drafts are kept
    pub fn set_task(&mut self, task: Task) {
        self.task = task;
    }

    pub fn begin_edit(&mut self) {
        if self.saving || self.deleting {
            return;
        }

        self.draft_title = self.task.title.clone();
        self.draft_description = self.task.description.clone().unwrap_or_default();
        self.error = None;
        self.mode = CardMode::Edit;
    }

    pub fn set_draft_title(&mut self, title: impl Into<String>) {
        self.draft_title = title.into();
    }

    pub fn set_draft_description(&mut self, description: impl Into<String>) {
        self.draft_description = description.into();
    }

    /// Back to view without persisting anything; ignored while saving
    pub fn cancel_edit(&mut self) {
        if self.saving {
            return;
        }

        self.mode = CardMode::View;
        self.draft_title.clear();
        self.draft_description.clear();
        self.error = None;
    }

    /// Marks the card as saving and hands out the update to send
    ///
    /// `None` outside edit mode or while another action is pending. The
    /// result goes back through [`TaskCard::finish_save`].
    pub fn begin_save(&mut self) -> Option<PendingSave> {
        if self.mode != CardMode::Edit || self.saving || self.deleting {
            return None;
        }

        self.saving = true;
        self.error = None;
        Some(PendingSave {
            task_id: self.task.id,
            title: self.draft_title.clone(),
            description: self.draft_description.clone(),
        })
    }

    /// Applies a saved update, or stays in edit mode with the error set
    pub fn finish_save(&mut self, request: PendingSave, result: ClientResult<u64>) -> bool {
        self.saving = false;

        match result {
            Ok(rows) => {
                tracing::debug!(task_id = %request.task_id, rows, "Task saved");
                self.task.apply(&TaskChanges {
                    title: request.title,
                    description: request.description,
                });
                self.draft_title.clear();
                self.draft_description.clear();
                self.mode = CardMode::View;
                true
            }
            Err(e) => {
                self.error = Some(e.user_message());
                false
            }
        }
    }

    /// Sends the drafts; returns whether the edit was saved
    pub async fn save(&mut self, actions: &dyn TaskActions) -> bool {
        let Some(request) = self.begin_save() else {
            return false;
        };

        let result = actions
            .update_task(request.task_id, &request.title, &request.description)
            .await;
        self.finish_save(request, result)
    }

    /// Asks for confirmation, then marks the card as deleting
    ///
    /// Returns the id to delete; the result goes back through
    /// [`TaskCard::finish_delete`].
    pub fn begin_delete(&mut self, confirm: &dyn Confirm) -> Option<Uuid> {
        if self.saving || self.deleting {
            return None;
        }
        if !confirm.confirm(DELETE_PROMPT) {
            return None;
        }

        self.deleting = true;
        self.error = None;
        Some(self.task.id)
    }

    pub fn finish_delete(&mut self, result: ClientResult<u64>) -> bool {
        self.deleting = false;

        match result {
            Ok(rows) => {
                tracing::debug!(task_id = %self.task.id, rows, "Task deleted");
                true
            }
            Err(e) => {
                self.error = Some(e.user_message());
                false
            }
        }
    }

    /// Deletes after confirmation; returns whether the task was deleted
    pub async fn delete(&mut self, actions: &dyn TaskActions, confirm: &dyn Confirm) -> bool {
        let Some(task_id) = self.begin_delete(confirm) else {
            return false;
        };

        let result = actions.delete_task(task_id).await;
        self.finish_delete(result)
    }
}

/// An update in flight, taken from the card's drafts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub task_id: Uuid,
    pub title: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ClientError, NewTaskForm};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingActions {
        calls: Mutex<Vec<String>>,
        fail_with: Option<String>,
    }

    impl RecordingActions {
        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn result(&self) -> ClientResult<u64> {
            match &self.fail_with {
                Some(message) => Err(ClientError::Api {
                    status: 502,
                    message: message.clone(),
                }),
                None => Ok(1),
            }
        }
    }

    #[async_trait]
    impl TaskActions for RecordingActions {
        async fn create_task(&self, _form: NewTaskForm) -> ClientResult<Task> {
            unreachable!("cards never create")
        }

        async fn update_task(&self, _id: Uuid, title: &str, description: &str) -> ClientResult<u64> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update {} / {}", title, description));
            self.result()
        }

        async fn delete_task(&self, _id: Uuid) -> ClientResult<u64> {
            self.calls.lock().unwrap().push("delete".to_string());
            self.result()
        }
    }

    fn card() -> TaskCard {
        TaskCard::new(Task {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Standup".to_string(),
            description: Some("Discussed the roadmap".to_string()),
            image_url: None,
            excel_url: None,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_begin_edit_seeds_drafts() {
        let mut card = card();
        card.begin_edit();

        assert_eq!(card.mode(), CardMode::Edit);
        assert_eq!(card.draft_title(), "Standup");
        assert_eq!(card.draft_description(), "Discussed the roadmap");
    }

    #[tokio::test]
    async fn test_cancel_edit_discards_drafts() {
        let actions = RecordingActions::default();
        let mut card = card();

        card.begin_edit();
        card.set_draft_title("Retro");
        card.cancel_edit();

        assert_eq!(card.mode(), CardMode::View);
        assert_eq!(card.task().title, "Standup");
        assert_eq!(card.draft_title(), "");
        assert!(card.error().is_none());

        // Nothing to save once back in view mode
        assert!(!card.save(&actions).await);
        assert!(actions.calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_applies_drafts() {
        let actions = RecordingActions::default();
        let mut card = card();

        card.begin_edit();
        card.set_draft_title("Standup notes");
        assert!(card.save(&actions).await);

        assert_eq!(actions.calls(), vec!["update Standup notes / Discussed the roadmap"]);
        assert_eq!(card.mode(), CardMode::View);
        assert_eq!(card.task().title, "Standup notes");
        assert!(!card.is_saving());
    }

    #[tokio::test]
    async fn test_failed_save_stays_editing() {
        let actions = RecordingActions::failing("Task update failed: timeout");
        let mut card = card();

        card.begin_edit();
        card.set_draft_title("Standup notes");
        assert!(!card.save(&actions).await);

        assert_eq!(card.mode(), CardMode::Edit);
        assert_eq!(card.error(), Some("Task update failed: timeout"));
        assert_eq!(card.draft_title(), "Standup notes");
        assert_eq!(card.task().title, "Standup");
    }

    #[tokio::test]
    async fn test_delete_asks_first() {
        let actions = RecordingActions::default();
        let mut card = card();

        let declined = |prompt: &str| {
            assert_eq!(prompt, "Delete this log?");
            false
        };
        assert!(!card.delete(&actions, &declined).await);
        assert!(actions.calls().is_empty());

        let accepted = |_: &str| true;
        assert!(card.delete(&actions, &accepted).await);
        assert_eq!(actions.calls(), vec!["delete"]);
    }

    #[tokio::test]
    async fn test_failed_delete_sets_error() {
        let actions = RecordingActions::failing("Task delete failed: boom");
        let mut card = card();

        assert!(!card.delete(&actions, &|_: &str| true).await);
        assert_eq!(card.error(), Some("Task delete failed: boom"));
        assert!(!card.is_deleting());
    }

    #[test]
    fn test_pending_save_blocks_other_actions() {
        let mut card = card();
        card.begin_edit();
        card.set_draft_title("Standup notes");

        let request = card.begin_save().unwrap();
        assert!(card.is_saving());
        assert_eq!(request.title, "Standup notes");

        assert!(card.begin_save().is_none());
        assert!(card.begin_delete(&|_: &str| true).is_none());
        card.cancel_edit();
        assert_eq!(card.mode(), CardMode::Edit);

        assert!(card.finish_save(request, Ok(1)));
        assert!(!card.is_saving());
        assert_eq!(card.task().title, "Standup notes");
        assert_eq!(card.mode(), CardMode::View);
    }

    #[test]
    fn test_pending_delete_blocks_edit() {
        let mut card = card();

        let task_id = card.begin_delete(&|_: &str| true).unwrap();
        assert_eq!(task_id, card.id());
        assert!(card.is_deleting());

        card.begin_edit();
        assert_eq!(card.mode(), CardMode::View);
        assert!(card.begin_delete(&|_: &str| true).is_none());

        let failed = card.finish_delete(Err(ClientError::Transport("connection reset".to_string())));
        assert!(!failed);
        assert!(!card.is_deleting());
        assert_eq!(card.error(), Some("Request failed: connection reset"));
    }
}
