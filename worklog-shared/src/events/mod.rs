//! Task change feed
//!
//! Row-level insert/update/delete notifications for the `tasks` table.
//!
//! - [`hub`]: in-process broadcast fan-out to subscribers
//! - [`listener`]: forwards PostgreSQL `NOTIFY task_changes` payloads into a hub
//!
//! # Payload format
//!
//! The table trigger and the in-memory store both emit:
//!
//! ```text
//! {"kind": "insert", "task_id": "<uuid>", "user_id": "<uuid>"}
//! ```
//!
//! # Example
//!
//! ```
//! use worklog_shared::events::{ChangeEvent, ChangeKind};
//!
//! let event = ChangeEvent::from_payload(
//!     r#"{"kind":"delete","task_id":"2f1e4c1a-0d4b-4bb5-9a43-5d8c6f3e2a10","user_id":"8c6c3b1a-6f5e-4d7a-9d6b-2f9a3c1e5b7d"}"#,
//! ).unwrap();
//! assert_eq!(event.kind, ChangeKind::Delete);
//! ```

pub mod hub;
pub mod listener;

pub use hub::ChangeHub;
pub use listener::{spawn_pg_listener, CHANNEL};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Payload errors
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Row operation that produced the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change on the `tasks` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub task_id: Uuid,
    /// Owner of the row; subscribers only see their own changes
    pub user_id: Uuid,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, task_id: Uuid, user_id: Uuid) -> Self {
        Self {
            kind,
            task_id,
            user_id,
        }
    }

    pub fn from_payload(payload: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn to_payload(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }
}
