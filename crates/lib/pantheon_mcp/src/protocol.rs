//! JSON-RPC 2.0 message shapes and the MCP payloads built on them.

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revisions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Why an inbound frame was not a usable request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("frame is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("unsupported jsonrpc version (expected \"2.0\")")]
    WrongVersion,

    #[error("frame has no string \"method\"")]
    MissingMethod,

    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// A decoded request or notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Absent for notifications.
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

impl Request {
    /// Decode one frame (without its line terminator).
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(frame).map_err(|_| FrameError::InvalidUtf8)?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(FrameError::NotAnObject);
        };
        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(FrameError::WrongVersion);
        }
        let method = match object.remove("method") {
            Some(Value::String(m)) => m,
            _ => return Err(FrameError::MissingMethod),
        };
        Ok(Self {
            id: object.remove("id").filter(|id| !id.is_null()),
            method,
            params: object.remove("params"),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Outbound JSON-RPC response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Response {
    jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Serialize `payload` as the result, falling back to an internal error.
    pub fn from_payload(id: Value, payload: &impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(result) => Self::success(id, result),
            Err(e) => Self::failure(id, INTERNAL_ERROR, format!("failed to encode result: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// MCP payloads
// ---------------------------------------------------------------------------

/// One piece of tool output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
}

/// The only shape a `tools/call` ever answers with, failures included.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolResult {
    pub content: Vec<ContentItem>,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
        }
    }

    /// Error outcome rendered as `Error: {message}`.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::text(format!("Error: {message}"))
    }
}

/// Name and version reported in the `initialize` handshake.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Pick the protocol version to answer `initialize` with.
pub fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|r| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|v| **v == r))
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

pub fn initialize_result(info: &ServerInfo, params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);
    json!({
        "protocolVersion": negotiate_version(requested),
        "capabilities": {"tools": {}},
        "serverInfo": info,
    })
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallParams {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl CallParams {
    /// `params` must be an object with a string `name`; `arguments`, when
    /// present and not null, must be an object.
    pub fn parse(params: Option<Value>) -> Result<Self, String> {
        let Some(Value::Object(mut params)) = params else {
            return Err("params must be an object".into());
        };
        let name = match params.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err("params.name must be a string".into()),
        };
        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => return Err("params.arguments must be an object".into()),
        };
        Ok(Self { name, arguments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_request_and_notification() {
        let req = Request::decode(br#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert_eq!(req.id, Some(json!(7)));
        assert_eq!(req.method, "ping");

        let note = Request::decode(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .unwrap();
        assert_eq!(note.id, None);
        assert_eq!(note.method, "notifications/initialized");
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        assert_eq!(Request::decode(b"\xff\xfe"), Err(FrameError::InvalidUtf8));
        assert!(matches!(Request::decode(b"{nope"), Err(FrameError::InvalidJson(_))));
        assert_eq!(Request::decode(b"[1,2]"), Err(FrameError::NotAnObject));
        assert_eq!(
            Request::decode(br#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#),
            Err(FrameError::WrongVersion)
        );
        assert_eq!(
            Request::decode(br#"{"jsonrpc":"2.0","id":1,"method":5}"#),
            Err(FrameError::MissingMethod)
        );
    }

    #[test]
    fn tool_result_wire_shape() {
        let value = serde_json::to_value(ToolResult::error("Unknown tool: x")).unwrap();
        assert_eq!(
            value,
            json!({"content": [{"type": "text", "text": "Error: Unknown tool: x"}]})
        );
    }

    #[test]
    fn response_omits_the_unused_half() {
        let ok = serde_json::to_value(Response::success(json!(1), json!({}))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 1, "result": {}}));

        let err = serde_json::to_value(Response::failure(json!("a"), METHOD_NOT_FOUND, "nope"))
            .unwrap();
        assert_eq!(
            err,
            json!({"jsonrpc": "2.0", "id": "a", "error": {"code": -32601, "message": "nope"}})
        );
    }

    #[test]
    fn version_negotiation_echoes_supported_versions() {
        assert_eq!(negotiate_version(Some("2024-11-05")), "2024-11-05");
        assert_eq!(negotiate_version(Some("1999-01-01")), SUPPORTED_PROTOCOL_VERSIONS[0]);
        assert_eq!(negotiate_version(None), SUPPORTED_PROTOCOL_VERSIONS[0]);
    }

    #[test]
    fn call_params_validation() {
        let parsed = CallParams::parse(Some(json!({"name": "t"}))).unwrap();
        assert_eq!(parsed.name, "t");
        assert!(parsed.arguments.is_empty());

        assert!(CallParams::parse(None).is_err());
        assert!(CallParams::parse(Some(json!({"arguments": {}}))).is_err());
        assert!(CallParams::parse(Some(json!({"name": "t", "arguments": [1]}))).is_err());
    }
}
