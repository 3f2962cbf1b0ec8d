//! Cafe backend API client.
//!
//! Provides HTTP communication with the cafe backend: menu fetches, order
//! placement and status updates, ledger lookups and settlements, feedback
//! submission, and auth. Every call funnels through [`request`]; the retry
//! policy lives in the `retry` module.

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::storage;

/// Hard ceiling on every backend request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable consulted when no base URL is stored yet.
const BASE_URL_ENV: &str = "CAFE_API_URL";

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Failure modes the caller must distinguish: 429 is never retried, 401
/// invalidates the session, everything else follows the retry policy.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many requests, please wait a moment")]
    RateLimited,
    #[error("Session expired, please sign in again")]
    Unauthorized,
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Cannot reach cafe backend at {url}")]
    Network { url: String },
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },
    #[error("Invalid response from cafe backend: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Rate-limit and auth failures must propagate without another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApiError::RateLimited | ApiError::Unauthorized)
    }
}

fn map_reqwest_error(url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout {
            url: url.to_string(),
        };
    }
    if err.is_connect() || err.is_request() {
        return ApiError::Network {
            url: url.to_string(),
        };
    }
    ApiError::Network {
        url: url.to_string(),
    }
}

fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        403 => "Not allowed for this account".to_string(),
        404 => "Cafe backend endpoint not found".to_string(),
        s if s >= 500 => format!("Cafe backend server error (HTTP {s})"),
        s => format!("Unexpected response from cafe backend (HTTP {s})"),
    }
}

// ---------------------------------------------------------------------------
// Base URL resolution
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if url.is_empty() {
        return url;
    }

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /api
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// Resolve the backend base URL: credential store first, then the
/// `CAFE_API_URL` environment variable. The resolved value is written back
/// to the store so later sessions no longer depend on the environment.
pub fn resolve_base_url() -> Result<String, ApiError> {
    if let Some(stored) = storage::get_credential(storage::KEY_API_BASE_URL) {
        let normalized = normalize_base_url(&stored);
        if !normalized.is_empty() {
            return Ok(normalized);
        }
    }

    if let Ok(env_url) = std::env::var(BASE_URL_ENV) {
        let normalized = normalize_base_url(&env_url);
        if !normalized.is_empty() {
            if let Err(e) = storage::set_credential(storage::KEY_API_BASE_URL, &normalized) {
                warn!(error = %e, "failed to persist base URL from environment");
            }
            return Ok(normalized);
        }
    }

    Err(ApiError::Config(
        "Terminal not configured: missing cafe backend URL".to_string(),
    ))
}

// ---------------------------------------------------------------------------
// Generic request
// ---------------------------------------------------------------------------

/// Perform an HTTP request against the cafe backend.
///
/// `path` includes the leading slash, e.g. `/api/menu?audience=public`.
/// `token` is attached as a bearer header when present. A 204 or empty body
/// resolves to `Value::Null`.
pub async fn request(
    base_url: &str,
    token: Option<&str>,
    path: &str,
    method: Method,
    body: Option<&Value>,
) -> Result<Value, ApiError> {
    let full_url = format!("{base_url}{path}");

    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {e}")))?;

    let mut req = client
        .request(method, &full_url)
        .header("Content-Type", "application/json");

    if let Some(token) = token {
        req = req.header("Authorization", format!("Bearer {token}"));
    }
    if let Some(b) = body {
        req = req.json(b);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| map_reqwest_error(base_url, &e))?;
    let status = resp.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::RateLimited);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }

    if !status.is_success() {
        // Preserve validation details from the backend error body.
        let body_text = resp.text().await.unwrap_or_default();
        let message = if let Ok(json) = serde_json::from_str::<Value>(&body_text) {
            let message = json
                .get("error")
                .or_else(|| json.get("message"))
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .unwrap_or_else(|| status_message(status));
            match json.get("details").or_else(|| json.get("errors")) {
                Some(details) => format!("{message}: {details}"),
                None => message,
            }
        } else if !body_text.trim().is_empty() {
            format!("{}: {}", status_message(status), body_text.trim())
        } else {
            status_message(status)
        };
        return Err(ApiError::Http {
            status: status.as_u16(),
            message,
        });
    }

    let body_text = resp.text().await.unwrap_or_default();
    if body_text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body_text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

/// Convenience wrapper resolving base URL and method string in one step.
/// Used by the command layer, which deals in strings from the webview.
pub async fn request_with_method_str(
    token: Option<&str>,
    path: &str,
    method: &str,
    body: Option<&Value>,
) -> Result<Value, ApiError> {
    let base = resolve_base_url()?;
    let http_method: Method = method
        .to_uppercase()
        .parse()
        .map_err(|_| ApiError::Config(format!("Invalid HTTP method: {method}")))?;
    request(&base, token, path, http_method, body).await
}

// ===========================================================================
// Tests
// ===========================================================================
