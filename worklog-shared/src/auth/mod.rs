//! Authentication utilities
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing (in-memory identity provider)
//! - [`jwt`]: HS256 access token signing and validation
//! - [`middleware`]: access token extraction and session cookies
//!
//! # Example
//!
//! ```no_run
//! use worklog_shared::auth::jwt::{create_token, Claims};
//! use worklog_shared::auth::password::{hash_password, verify_password};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_password("user_password")?;
//! assert!(verify_password("user_password", &hash)?);
//!
//! let claims = Claims::new(uuid::Uuid::new_v4(), None);
//! let token = create_token(&claims, "a-secret-of-at-least-32-characters")?;
//! # Ok(())
//! # }
//! ```

pub mod jwt;
pub mod middleware;
pub mod password;
