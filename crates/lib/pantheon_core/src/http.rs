//! Shared HTTP plumbing for the backend clients.

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

use crate::backend::BackendError;

/// Per-request timeout applied to every backend call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body echoed back into a message.
const MAX_ERROR_BODY: usize = 500;

pub(crate) fn build_client(service: &'static str) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("pantheon/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| BackendError::Request {
            service,
            message: format!("failed to build HTTP client: {e}"),
        })
}

pub(crate) fn request_error(service: &'static str, err: reqwest::Error) -> BackendError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not connect".to_string()
    } else {
        err.without_url().to_string()
    };
    BackendError::Request { service, message }
}

/// Convert a non-success response into [`BackendError::Api`].
///
/// `extract` pulls a service-specific summary out of a JSON error body; the
/// raw (truncated) body is used when it finds nothing.
pub(crate) async fn api_error(
    service: &'static str,
    resp: Response,
    extract: fn(&Value) -> Option<String>,
) -> BackendError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| extract(&v))
        .unwrap_or_else(|| truncate(body.trim(), MAX_ERROR_BODY));
    BackendError::Api {
        service,
        status,
        message: if message.is_empty() {
            "no error details returned".to_string()
        } else {
            message
        },
    }
}

/// Decode a successful JSON response body.
pub(crate) async fn json_body(
    service: &'static str,
    resp: Response,
) -> Result<Value, BackendError> {
    let bytes = resp.bytes().await.map_err(|e| request_error(service, e))?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode {
        service,
        message: e.to_string(),
    })
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
