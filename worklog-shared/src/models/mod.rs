//! Data models
//!
//! # Models
//!
//! - `task`: worklog entries and their database operations
//! - `user`: identity provider user records

pub mod task;
pub mod user;
