/// Configuration management for the API server
///
/// Configuration is read from environment variables (a `.env` file is
/// honored) into a type-safe struct.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8080`)
/// - `WORKLOG_BACKEND`: `hosted` (default) or `memory`
/// - `DATABASE_URL`: backend PostgreSQL URL (required when hosted)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `BACKEND_URL` / `BACKEND_ANON_KEY`: hosted auth and storage (required when hosted)
/// - `STORAGE_BUCKET`: attachment bucket (default `task-files`)
/// - `MAX_UPLOAD_BYTES`: multipart body limit (default 10 MiB)
/// - `SITE_URL`: public site URL for confirmation links
/// - `JWT_SECRET`: token secret of the in-memory identity provider (required when memory)
/// - `CORS_ORIGINS`: comma-separated allowed origins (default `*`)
/// - `PRODUCTION`: enables HSTS and secure cookies
///
/// # Example
///
/// ```no_run
/// use worklog_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_STORAGE_BUCKET: &str = "task-files";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,

    pub backend: BackendConfig,

    /// Present when the hosted backend is used
    pub database: Option<DatabaseConfig>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// Public base URL of this site
    pub site_url: String,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS, `Secure` cookies)
    pub production: bool,

    /// Largest accepted request body, attachments included
    pub max_upload_bytes: usize,
}

/// Which backend implementation serves identity, storage and tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Hosted,
    Memory,
}

/// Backend collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Base URL of the hosted auth and storage services
    pub url: Option<String>,

    /// Public API key sent with every hosted request
    pub anon_key: Option<String>,

    pub storage_bucket: String,

    /// Signing secret of the in-memory identity provider
    ///
    /// At least 32 bytes. Generate with: `openssl rand -hex 32`
    pub jwt_secret: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    pub max_connections: u32,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable required by the selected backend is
    /// missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("API_HOST", "0.0.0.0");
        let port = var("API_PORT", "8080").parse::<u16>()?;
        let site_url = var("SITE_URL", &format!("http://localhost:{}", port));
        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let production = var("PRODUCTION", "false").parse::<bool>()?;
        let max_upload_bytes =
            var("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string()).parse::<usize>()?;

        let kind = match var("WORKLOG_BACKEND", "hosted").to_lowercase().as_str() {
            "hosted" => BackendKind::Hosted,
            "memory" => BackendKind::Memory,
            other => anyhow::bail!("WORKLOG_BACKEND must be `hosted` or `memory`, got `{}`", other),
        };

        let backend = BackendConfig {
            kind,
            url: lookup("BACKEND_URL"),
            anon_key: lookup("BACKEND_ANON_KEY"),
            storage_bucket: var("STORAGE_BUCKET", DEFAULT_STORAGE_BUCKET),
            jwt_secret: lookup("JWT_SECRET"),
        };

        let database = match lookup("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: var("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?,
            }),
            None => None,
        };

        match kind {
            BackendKind::Hosted => {
                if backend.url.is_none() {
                    anyhow::bail!("BACKEND_URL environment variable is required");
                }
                if backend.anon_key.is_none() {
                    anyhow::bail!("BACKEND_ANON_KEY environment variable is required");
                }
                if database.is_none() {
                    anyhow::bail!("DATABASE_URL environment variable is required");
                }
            }
            BackendKind::Memory => match &backend.jwt_secret {
                None => anyhow::bail!("JWT_SECRET environment variable is required"),
                Some(secret) if secret.len() < 32 => {
                    anyhow::bail!("JWT_SECRET must be at least 32 characters long")
                }
                Some(_) => {}
            },
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                site_url: site_url.trim_end_matches('/').to_string(),
                cors_origins,
                production,
                max_upload_bytes,
            },
            backend,
            database,
        })
    }

    /// In-memory configuration for tests and local development
    pub fn memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                site_url: "http://localhost:8080".to_string(),
                cors_origins: vec!["*".to_string()],
                production: false,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            backend: BackendConfig {
                kind: BackendKind::Memory,
                url: None,
                anon_key: None,
                storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
                jwt_secret: Some(jwt_secret.into()),
            },
            database: None,
        }
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Where confirmation emails send the user back to
    pub fn auth_callback_url(&self) -> String {
        format!("{}/auth/callback", self.api.site_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_bind_address() {
        let config = Config::memory("test-secret-key-at-least-32-bytes-long");
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.auth_callback_url(), "http://localhost:8080/auth/callback");
    }

    #[test]
    fn test_hosted_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("BACKEND_URL", "https://project.example.co"),
            ("BACKEND_ANON_KEY", "anon"),
            ("DATABASE_URL", "postgresql://localhost/worklog"),
        ]))
        .unwrap();

        assert_eq!(config.backend.kind, BackendKind::Hosted);
        assert_eq!(config.backend.storage_bucket, "task-files");
        assert_eq!(config.api.max_upload_bytes, 10485760);
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(!config.api.production);
        assert_eq!(config.database.unwrap().max_connections, 10);
    }

    #[test]
    fn test_hosted_requires_backend_url() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgresql://localhost/x")]))
            .unwrap_err();
        assert!(err.to_string().contains("BACKEND_URL"));
    }

    #[test]
    fn test_memory_requires_long_secret() {
        let err = Config::from_lookup(lookup(&[
            ("WORKLOG_BACKEND", "memory"),
            ("JWT_SECRET", "short"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("32 characters"));

        let config = Config::from_lookup(lookup(&[
            ("WORKLOG_BACKEND", "memory"),
            ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
            ("SITE_URL", "https://worklog.example.com/"),
            ("CORS_ORIGINS", "https://a.example.com, https://b.example.com"),
        ]))
        .unwrap();
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(
            config.auth_callback_url(),
            "https://worklog.example.com/auth/callback"
        );
        assert_eq!(config.api.cors_origins.len(), 2);
    }

    #[test]
    fn test_unknown_backend() {
        assert!(Config::from_lookup(lookup(&[("WORKLOG_BACKEND", "sqlite")])).is_err());
    }
}
