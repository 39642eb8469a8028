//! User-facing message translation
//!
//! Backend failures arrive as free-form provider strings. These helpers pick
//! out the few cases the UI words differently and pass everything else
//! through untouched.

/// Shown when the provider gave no message at all
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const EMAIL_NOT_CONFIRMED: &str = "Please confirm your email before logging in.";
pub const ACCOUNT_EXISTS: &str = "An account with this email already exists. Please login instead.";

pub const LOGGING_IN: &str = "Logging in...";
pub const CREATING_ACCOUNT: &str = "Creating account...";
pub const CONFIRM_EMAIL_SENT: &str =
    "Account created! Please check your email to confirm your account before logging in.";
pub const SIGNUP_SUCCESSFUL: &str = "Signup successful. Redirecting...";

pub const UNAUTHORIZED: &str = "Unauthorized";
pub const TASK_ID_REQUIRED: &str = "Task id is required";
pub const INVALID_TASK_ID: &str = "Invalid task id";

/// Failure reported for a sign-in attempt
pub fn sign_in_failure(raw: &str) -> String {
    let lower = raw.to_lowercase();

    if lower.contains("invalid login") {
        INVALID_CREDENTIALS.to_string()
    } else if lower.contains("email not confirmed") {
        EMAIL_NOT_CONFIRMED.to_string()
    } else {
        passthrough(raw)
    }
}

/// Failure reported for a sign-up attempt
pub fn sign_up_failure(raw: &str) -> String {
    if raw.to_lowercase().contains("already") {
        ACCOUNT_EXISTS.to_string()
    } else {
        passthrough(raw)
    }
}

/// Raw provider message, or the generic sentence when it is blank
pub fn passthrough(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Which step of an action failed at the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStep {
    ImageUpload,
    ExcelUpload,
    Create,
    Update,
    Delete,
}

impl ActionStep {
    fn prefix(&self) -> &'static str {
        match self {
            ActionStep::ImageUpload => "Image upload failed",
            ActionStep::ExcelUpload => "Excel upload failed",
            ActionStep::Create => "Task creation failed",
            ActionStep::Update => "Task update failed",
            ActionStep::Delete => "Task delete failed",
        }
    }
}

/// Prefixes a backend message with the step that failed
pub fn action_failure(step: ActionStep, raw: &str) -> String {
    format!("{}: {}", step.prefix(), passthrough(raw))
}
