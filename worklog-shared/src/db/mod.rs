//! Database layer
//!
//! - `pool`: PostgreSQL connection pool with health checks
//! - `migrations`: embedded migration runner
//!
//! Row types and their queries are in [`crate::models`].

pub mod migrations;
pub mod pool;
