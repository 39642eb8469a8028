//! Task form validation
//!
//! The same rules guard the create dialog on the client and the server
//! actions, so both sides reject a bad entry with the same sentence.
//!
//! # Rules
//!
//! | field         | min | max  |
//! |---------------|-----|------|
//! | `title`       | 3   | 100  |
//! | `description` | 5   | 1000 |
//!
//! Lengths are counted in characters, not bytes. Input is not trimmed.
//!
//! # Example
//!
//! ```
//! use worklog_shared::validation::TaskInput;
//!
//! let input = TaskInput::new("Hi", "Fixed the flaky deploy job");
//! let err = input.check().unwrap_err();
//! assert_eq!(err.field, "title");
//! assert_eq!(err.message, "Title must be at least 3 characters");
//! ```

use serde::{Deserialize, Serialize};
use validator::Validate;

pub const TASK_TITLE_MIN_LENGTH: u64 = 3;
pub const TASK_TITLE_MAX_LENGTH: u64 = 100;
pub const TASK_DESCRIPTION_MIN_LENGTH: u64 = 5;
pub const TASK_DESCRIPTION_MAX_LENGTH: u64 = 1000;

/// Fallback when a failure cannot be attributed to a field
pub const INVALID_FORM_DATA: &str = "Invalid form data";

/// Title and description of a worklog entry, as typed by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    #[validate(length(min = TASK_TITLE_MIN_LENGTH, max = TASK_TITLE_MAX_LENGTH))]
    pub title: String,

    #[validate(length(min = TASK_DESCRIPTION_MIN_LENGTH, max = TASK_DESCRIPTION_MAX_LENGTH))]
    pub description: String,
}

/// First validation failure, in field declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl TaskInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Validates the input and reports the first failing field
    ///
    /// `title` is checked before `description`, so a form with both fields
    /// wrong surfaces the title message.
    pub fn check(&self) -> Result<(), FieldError> {
        match self.field_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every failing field in declaration order, for forms that show one
    /// message under each input
    pub fn field_errors(&self) -> Vec<FieldError> {
        let errors = match self.validate() {
            Ok(()) => return Vec::new(),
            Err(errors) => errors,
        };
        let fields = errors.field_errors();
        let mut out = Vec::new();

        if fields.contains_key("title") {
            out.push(FieldError {
                field: "title".to_string(),
                message: length_message(
                    "Title",
                    &self.title,
                    TASK_TITLE_MIN_LENGTH,
                    TASK_TITLE_MAX_LENGTH,
                ),
            });
        }

        if fields.contains_key("description") {
            // The form labels the description as the task itself.
            out.push(FieldError {
                field: "description".to_string(),
                message: length_message(
                    "Task",
                    &self.description,
                    TASK_DESCRIPTION_MIN_LENGTH,
                    TASK_DESCRIPTION_MAX_LENGTH,
                ),
            });
        }

        if out.is_empty() {
            out.push(FieldError {
                field: "form".to_string(),
                message: INVALID_FORM_DATA.to_string(),
            });
        }

        out
    }
}

fn length_message(label: &str, value: &str, min: u64, max: u64) -> String {
    if (value.chars().count() as u64) < min {
        format!("{} must be at least {} characters", label, min)
    } else {
        format!("{} must be at most {} characters", label, max)
    }
}
