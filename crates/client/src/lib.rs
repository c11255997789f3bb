//! Shopdesk API Client
//!
//! Authenticated access to the shop backend:
//! - Request pipeline injecting the session's bearer token
//! - List normalization into `{items, total}` using `X-Total-Count`
//! - Centralized 401 handling: clear the session, then request a restart
//! - Login plus typed products, users and orders resources

pub mod auth;
pub mod client;
pub mod mock;
pub mod resources;
pub mod restart;

use thiserror::Error;

pub use auth::AuthApi;
pub use client::{ApiClient, ApiResponse, ListPage, RequestOptions, TOTAL_COUNT_HEADER};
pub use resources::{
    NewOrder, NewProduct, NewUser, Order, OrderFilter, OrderPatch, OrdersApi, Product,
    ProductFilter, ProductPatch, ProductsApi, User, UserFilter, UserPatch, UsersApi, PER_PAGE,
};
pub use restart::{NoopRestart, Restart, SignalRestart};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API configuration error: {0}")]
    Configuration(String),

    #[error("API request error: {0}")]
    Request(String),

    #[error("API response error ({status}): {message}")]
    Response { status: u16, message: String },

    #[error("API decode error: {0}")]
    Decode(String),

    #[error("Unauthorized: session cleared")]
    Unauthorized,

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}
