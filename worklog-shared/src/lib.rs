//! # Worklog Shared Library
//!
//! Types, validation and backend plumbing used by both the Worklog API
//! server and the Worklog client.
//!
//! ## Module Organization
//!
//! - `validation`: task form constraints and their messages
//! - `messages`: translation of provider failures into display strings
//! - `models`: task rows and identity provider users
//! - `db`: PostgreSQL pool and migrations
//! - `auth`: password hashing, access tokens, session cookies
//! - `backend`: identity, object storage and task store collaborators
//! - `events`: the task change feed

pub mod auth;
pub mod backend;
pub mod db;
pub mod events;
pub mod messages;
pub mod models;
pub mod validation;

/// Current version of the Worklog shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
