//! Identity provider user
//!
//! Users live in the identity provider, not in this application's database.
//! This is the subset of the provider's user record the application reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-issued user ID; owns tasks via `tasks.user_id`
    pub id: Uuid,

    #[serde(default)]
    pub email: Option<String>,

    /// Set once the address is confirmed; `None` while confirmation is pending
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}
