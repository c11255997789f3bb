//! Login and logout
//!
//! Login talks to `POST {base}/login` directly rather than through the
//! request pipeline: a 401 there means bad credentials, not a stale session,
//! so it must not clear anything or restart the client.

use serde::{Deserialize, Serialize};

use crate::client::error_message;
use crate::{ApiClient, ApiError};

const LOGIN_PATH: &str = "/login";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Session lifecycle operations on an [`ApiClient`]
#[derive(Debug, Clone, Copy)]
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi { client: self }
    }
}

impl AuthApi<'_> {
    /// Exchange credentials for a token and store it in the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "Missing username or password".to_string(),
            ));
        }

        let response = self
            .client
            .http()
            .post(self.client.url(LOGIN_PATH))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::info!(username = %username, status = %status, "Login rejected");
            return Err(ApiError::LoginFailed(error_message(status, &body)));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("Failed to parse login response: {}", e)))?;

        self.client.session().set_token(body.token);
        tracing::info!(username = %username, "Logged in");
        Ok(())
    }

    /// Drop the current session.
    pub fn logout(&self) {
        self.client.session().clear_token();
    }

    pub fn is_logged_in(&self) -> bool {
        self.client.session().is_authenticated()
    }
}
