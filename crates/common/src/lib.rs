//! Shared utilities, configuration, and error handling for Shopdesk
//!
//! This crate provides common functionality used across the Shopdesk console:
//! - Configuration management following 12-factor principles
//! - Configuration error type
//! - A wall-clock abstraction so expiry arithmetic can be tested

pub mod clock;
pub mod config;
pub mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{ConfigError, Result};
