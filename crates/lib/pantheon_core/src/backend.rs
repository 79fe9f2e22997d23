//! Backend collaborator contract.
//!
//! A backend exposes a cheap connectivity probe and a single `invoke` entry
//! point keyed by its own operation enum. The MCP registry binds each tool
//! name to one operation variant, so no backend-specific request shapes leak
//! into the protocol layer.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Effective tool arguments after schema normalization.
pub type Arguments = Map<String, Value>;

/// Failures raised by a storage backend.
///
/// The `Display` text is what reaches the MCP client, so variants carry a
/// short message rather than wrapping transport errors wholesale.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{service} API error (HTTP {status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },

    #[error("Unexpected {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{service} does not accept {kind} credentials")]
    UnsupportedCredential {
        service: &'static str,
        kind: &'static str,
    },
}

/// A remote storage service the MCP server can call into.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Tagged operation variants this backend supports.
    type Operation: Copy + fmt::Debug + Send + Sync + 'static;

    /// One cheap, read-only call used during startup to verify credentials.
    async fn probe(&self) -> Result<(), BackendError>;

    /// Perform `operation` with already-normalized arguments.
    async fn invoke(
        &self,
        operation: Self::Operation,
        arguments: Arguments,
    ) -> Result<Value, BackendError>;
}

// ---------------------------------------------------------------------------
// Argument accessors
// ---------------------------------------------------------------------------

/// Fetch a string argument that must be present.
pub fn required_str<'a>(args: &'a Arguments, field: &str) -> Result<&'a str, BackendError> {
    match args.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(invalid(field, "expected a string")),
        None => Err(invalid(field, "is required")),
    }
}

/// Fetch an optional string argument. Empty strings count as absent.
pub fn optional_str<'a>(args: &'a Arguments, field: &str) -> Result<Option<&'a str>, BackendError> {
    match args.get(field) {
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(invalid(field, "expected a string")),
    }
}

/// Fetch an optional non-negative integer argument.
pub fn optional_u64(args: &Arguments, field: &str) -> Result<Option<u64>, BackendError> {
    match args.get(field) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                return Ok(Some(v));
            }
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(Some(f as u64)),
                _ => Err(invalid(field, "expected a non-negative integer")),
            }
        }
        Some(_) => Err(invalid(field, "expected a number")),
    }
}

/// Fetch an optional boolean argument.
pub fn optional_bool(args: &Arguments, field: &str) -> Result<Option<bool>, BackendError> {
    match args.get(field) {
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(invalid(field, "expected a boolean")),
    }
}

fn invalid(field: &str, reason: &str) -> BackendError {
    BackendError::InvalidArgument {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
