//! # Worklog API Server Library
//!
//! This library provides the core functionality for the Worklog API server.
//!
//! ## Modules
//!
//! - `actions`: Task create/update/delete shared by the API and the pages
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and session extractors
//! - `routes`: API and page route handlers

pub mod actions;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
