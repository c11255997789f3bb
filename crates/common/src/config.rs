//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Default storage slot holding the bearer token
pub const DEFAULT_SESSION_KEY: &str = "jwt";

/// Default safety margin before a token's `exp` claim, in seconds
pub const DEFAULT_EXPIRY_MARGIN_SECS: u64 = 30;

/// Default HTTP timeout, in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base address every API path is appended to
    pub api_base: String,

    /// Session persistence
    pub session_key: String,
    pub session_dir: PathBuf,
    pub expiry_margin_secs: u64,

    /// HTTP client
    pub http_timeout_secs: u64,

    /// Optional credentials for non-interactive login
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for Config {
    #[mutants::skip]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base", &self.api_base)
            .field("session_key", &self.session_key)
            .field("session_dir", &self.session_dir)
            .field("expiry_margin_secs", &self.expiry_margin_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let api_base = env::var("SHOPDESK_API_BASE")
            .map_err(|_| ConfigError::Missing("SHOPDESK_API_BASE is required".to_string()))?;
        if api_base.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "SHOPDESK_API_BASE must not be empty".to_string(),
            ));
        }

        let http_timeout_secs = parse_secs("SHOPDESK_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if http_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "SHOPDESK_HTTP_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        let config = Self {
            api_base,
            session_key: env::var("SHOPDESK_SESSION_KEY")
                .unwrap_or_else(|_| DEFAULT_SESSION_KEY.to_string()),
            session_dir: env::var("SHOPDESK_SESSION_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".shopdesk")),
            expiry_margin_secs: parse_secs("SHOPDESK_EXPIRY_MARGIN_SECS", DEFAULT_EXPIRY_MARGIN_SECS)?,
            http_timeout_secs,
            username: env::var("SHOPDESK_USERNAME").ok(),
            password: env::var("SHOPDESK_PASSWORD").ok(),
        };

        tracing::debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Configuration pointing at `api_base` with every other field defaulted
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            session_dir: PathBuf::from(".shopdesk"),
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            username: None,
            password: None,
        }
    }

    /// Both login credentials, when configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

fn parse_secs(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} must be a whole number of seconds", name))),
        Err(_) => Ok(default),
    }
}
