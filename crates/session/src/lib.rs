//! Shopdesk Session Store
//!
//! Single source of truth for "am I logged in":
//! - Bearer token held in memory and mirrored to a durable storage slot
//! - Automatic expiry driven by the token's `exp` claim, with a safety margin
//! - Cross-instance synchronization through storage change events
//! - Observer registry notified on every session transition

pub mod claims;
pub mod error;
pub mod storage;
pub mod store;

use std::time::Duration;

pub use claims::{decode_claims, expiry_delay, TokenClaims};
pub use error::SessionError;
pub use storage::{
    FileStorage, MemoryStorage, SessionStorage, StorageEvent, StorageWatcher, TabId, EXTERNAL_WRITER,
};
pub use store::{SessionStore, Subscription};

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Storage slot holding the token
    pub key: String,
    /// How long before the `exp` claim the session is dropped
    pub expiry_margin: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: shopdesk_common::config::DEFAULT_SESSION_KEY.to_string(),
            expiry_margin: Duration::from_secs(shopdesk_common::config::DEFAULT_EXPIRY_MARGIN_SECS),
        }
    }
}

impl SessionConfig {
    /// Session settings from the console configuration.
    pub fn from_config(config: &shopdesk_common::Config) -> Result<Self, SessionError> {
        if config.session_key.is_empty() {
            return Err(SessionError::Configuration(
                "session key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            key: config.session_key.clone(),
            expiry_margin: Duration::from_secs(config.expiry_margin_secs),
        })
    }
}
