/// Client configuration
///
/// # Environment Variables
///
/// - `WORKLOG_API_URL`: server base URL (default `http://127.0.0.1:8080`)
/// - `WORKLOG_EMAIL` / `WORKLOG_PASSWORD`: account the watch binary signs in with
/// - `WORKLOG_POLL_INTERVAL_MS`: polling fallback interval (default 3000)

use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,

    pub email: Option<String>,

    pub password: Option<String>,

    /// How often the grid refetches regardless of the change feed
    pub poll_interval: Duration,
}

impl ClientConfig {
    /// Loads configuration from environment variables (a `.env` file is honored)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let poll_interval_ms = match lookup("WORKLOG_POLL_INTERVAL_MS") {
            Some(value) => value.parse::<u64>()?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };
        if poll_interval_ms == 0 {
            anyhow::bail!("WORKLOG_POLL_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            api_url: lookup("WORKLOG_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            email: lookup("WORKLOG_EMAIL"),
            password: lookup("WORKLOG_PASSWORD"),
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }

    /// Email and password, both required
    pub fn credentials(&self) -> anyhow::Result<(String, String)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Ok((email.clone(), password.clone())),
            _ => anyhow::bail!("WORKLOG_EMAIL and WORKLOG_PASSWORD environment variables are required"),
        }
    }
}
