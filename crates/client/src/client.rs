//! Authenticated request pipeline
//!
//! Every backend call goes through [`ApiClient::request`], which prefixes the
//! configured base URL, attaches `Authorization: Bearer <token>` while a
//! session is active and normalizes the response:
//! - 204 becomes [`ApiResponse::NoContent`]
//! - a JSON array becomes [`ApiResponse::List`] with a total count
//! - any other JSON value is passed through as [`ApiResponse::Json`]
//!
//! A 401 clears the session and triggers the restart hook; the caller gets
//! [`ApiError::Unauthorized`] instead of a result.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopdesk_common::Config;
use shopdesk_session::SessionStore;

use crate::{ApiError, Restart};

/// Response header carrying the full size of a paginated collection
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Per-call options, mirroring what a caller may hand to `fetch`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// Serialize `body` as the JSON request body
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_string(body)
            .map_err(|e| ApiError::Request(format!("Failed to serialize request body: {}", e)))?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// One page of a collection plus the collection's total size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T = Value> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> ListPage<T> {
    /// Number of pages at `per_page` items each; never less than 1.
    pub fn total_pages(&self, per_page: u32) -> u64 {
        if per_page == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(per_page)).max(1)
    }
}

impl ListPage<Value> {
    /// Deserialize every item into `T`
    pub fn typed<T: DeserializeOwned>(self) -> Result<ListPage<T>, ApiError> {
        let items = self
            .items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| ApiError::Decode(format!("Unexpected list item: {}", e)))?;

        Ok(ListPage {
            items,
            total: self.total,
        })
    }
}

/// Normalized successful response
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    NoContent,
    List(ListPage),
    Json(Value),
}

impl ApiResponse {
    pub fn is_no_content(&self) -> bool {
        matches!(self, ApiResponse::NoContent)
    }

    pub fn into_list(self) -> Result<ListPage, ApiError> {
        match self {
            ApiResponse::List(page) => Ok(page),
            other => Err(ApiError::Decode(format!(
                "Expected a JSON array, got {}",
                other.kind()
            ))),
        }
    }

    /// Deserialize a non-list JSON body into `T`
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            ApiResponse::Json(value) => serde_json::from_value(value)
                .map_err(|e| ApiError::Decode(format!("Unexpected response body: {}", e))),
            other => Err(ApiError::Decode(format!(
                "Expected a JSON object, got {}",
                other.kind()
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiResponse::NoContent => "no content",
            ApiResponse::List(_) => "a list",
            ApiResponse::Json(_) => "a JSON value",
        }
    }
}

/// Wrap JSON arrays as a [`ListPage`]; other values pass through.
///
/// `total_hint` comes from the total-count header and wins over the array
/// length when present.
pub fn normalize(value: Value, total_hint: Option<u64>) -> ApiResponse {
    match value {
        Value::Array(items) => {
            let total = total_hint.unwrap_or(items.len() as u64);
            ApiResponse::List(ListPage { items, total })
        }
        other => ApiResponse::Json(other),
    }
}

/// Numeric value of the total-count header, if present and well-formed
pub fn total_count(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(TOTAL_COUNT_HEADER)?;

    match raw.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(total) => Some(total),
        None => {
            tracing::warn!(value = ?raw, "Ignoring malformed total count header");
            None
        }
    }
}

/// Error message from a backend error body (`{"error": ...}` or `{"message": ...}`)
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for field in ["error", "message"] {
            if let Some(Value::String(message)) = map.get(field) {
                return message.clone();
            }
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.trim().to_string()
    }
}

/// HTTP client bound to one backend and one session.
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
    restart: Arc<dyn Restart>,
}

impl ApiClient {
    /// Create a client for `config.api_base`.
    pub fn new(
        config: &Config,
        session: Arc<SessionStore>,
        restart: Arc<dyn Restart>,
    ) -> Result<Self, ApiError> {
        let base_url = config.api_base.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| {
            ApiError::Configuration(format!("Invalid API base URL {:?}: {}", config.api_base, e))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            session,
            restart,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Full URL for a backend-relative path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform an authenticated request against the backend.
    pub async fn request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url(path);
        let RequestOptions {
            method,
            mut headers,
            query,
            body,
        } = options;

        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        if let Some(token) = self.session.get_token().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ApiError::Request("Session token is not a valid header value".to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self.http.request(method.clone(), &url).headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        tracing::debug!(method = %method, url = %url, "Sending API request");

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(method = %method, url = %url, "API returned 401, clearing session");
            self.session.clear_token();
            self.restart.restart();
            return Err(ApiError::Unauthorized);
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(ApiResponse::NoContent);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(ApiError::Response {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let total_hint = total_count(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Request(format!("Failed to read response body: {}", e)))?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::Decode(format!("Response body is not JSON: {}", e)))?;

        Ok(normalize(value, total_hint))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
