/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Session endpoints (sign-up, sign-in, sign-out, session)
/// - `tasks`: Task list and mutations
/// - `changes`: SSE task change feed
/// - `pages`: Server-rendered auth and dashboard pages

pub mod auth;
pub mod changes;
pub mod health;
pub mod pages;
pub mod tasks;
