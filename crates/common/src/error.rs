//! Configuration error types for Shopdesk

/// Common result type
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while assembling runtime configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration missing: {0}")]
    Missing(String),

    #[error("Configuration invalid: {0}")]
    Invalid(String),
}
