//! # Worklog Client Library
//!
//! Client-side state for the worklog: the live task grid, task cards, the
//! create dialog and the auth form, all driven through the server's JSON API.
//!
//! ## Modules
//!
//! - `api`: HTTP client and the traits the components talk through
//! - `grid`: the task list, kept current by the change feed and polling
//! - `card`: view/edit/delete state for one task
//! - `dialog`: the create-task form with local validation
//! - `auth_form`: login and sign-up
//! - `config`: environment configuration for the `worklog` binary
//!
//! ## Example
//!
//! ```no_run
//! use worklog_client::api::ApiClient;
//! use worklog_client::auth_form::{AuthForm, AuthOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new("http://127.0.0.1:8080")?;
//! let mut form = AuthForm::new();
//! form.set_email("ada@example.com");
//! form.set_password("secret1");
//!
//! if let AuthOutcome::SignedIn(session) = form.submit(&client).await {
//!     println!("Signed in as {}", session.user.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth_form;
pub mod card;
pub mod config;
pub mod dialog;
pub mod grid;
