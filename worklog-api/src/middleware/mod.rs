/// Middleware modules for the API server
///
/// - `security`: security response headers
/// - `session`: extractors resolving the caller's session

pub mod security;
pub mod session;
