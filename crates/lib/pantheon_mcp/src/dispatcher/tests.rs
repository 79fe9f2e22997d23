use std::sync::Mutex;

use async_trait::async_trait;
use pantheon_core::backend::BackendError;
use serde_json::{Value, json};

use super::*;
use crate::protocol::ContentItem;
use crate::schema::{FieldSpec, InputSchema, ToolDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Echo,
    Fail,
    Explode,
}

/// Records every invocation and answers according to the operation.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(Op, Arguments)>>,
}

#[async_trait]
impl Backend for Recorder {
    type Operation = Op;

    async fn probe(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn invoke(&self, operation: Op, arguments: Arguments) -> Result<Value, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((operation, arguments.clone()));
        }
        match operation {
            Op::Echo => Ok(Value::Object(arguments)),
            Op::Fail => Err(BackendError::Api {
                service: "Stub",
                status: 500,
                message: "backend exploded politely".into(),
            }),
            Op::Explode => panic!("secret panic payload"),
        }
    }
}

fn dispatcher() -> (Dispatcher<Recorder>, Arc<Recorder>) {
    let registry = ToolRegistry::new([
        (
            ToolDefinition::new(
                "echo",
                "Echo arguments",
                InputSchema::new(vec![
                    FieldSpec::string("path").default_value(""),
                    FieldSpec::boolean("recursive").default_value(false),
                ]),
            ),
            Op::Echo,
        ),
        (
            ToolDefinition::new(
                "needs_path",
                "Requires a path",
                InputSchema::new(vec![FieldSpec::string("path").required()]),
            ),
            Op::Echo,
        ),
        (ToolDefinition::new("fail", "Always fails", InputSchema::empty()), Op::Fail),
        (ToolDefinition::new("explode", "Panics", InputSchema::empty()), Op::Explode),
    ])
    .expect("registry");
    let backend = Arc::new(Recorder::default());
    (Dispatcher::new(Arc::new(registry), backend.clone()), backend)
}

fn text(result: &ToolResult) -> &str {
    assert_eq!(result.content.len(), 1, "exactly one content item");
    let ContentItem::Text { text } = &result.content[0];
    text
}

fn args(value: Value) -> Arguments {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn unknown_tool_never_reaches_the_backend() {
    let (dispatcher, backend) = dispatcher();
    let result = dispatcher.call("no_such_tool", &Arguments::new()).await;
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"content": [{"type": "text", "text": "Error: Unknown tool: no_such_tool"}]})
    );
    assert!(backend.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn schema_violation_is_reported_as_content() {
    let (dispatcher, backend) = dispatcher();
    let result = dispatcher.call("needs_path", &Arguments::new()).await;
    assert_eq!(text(&result), "Error: Invalid arguments: missing required field 'path'");
    assert!(backend.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn defaults_reach_the_backend_once_and_input_is_untouched() {
    let (dispatcher, backend) = dispatcher();
    let raw = args(json!({"path": "/docs"}));
    let result = dispatcher.call("echo", &raw).await;

    assert_eq!(raw, args(json!({"path": "/docs"})));
    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, args(json!({"path": "/docs", "recursive": false})));

    let echoed: Value = serde_json::from_str(text(&result)).unwrap();
    assert_eq!(echoed, json!({"path": "/docs", "recursive": false}));
}

#[tokio::test]
async fn success_is_pretty_printed() {
    let (dispatcher, _) = dispatcher();
    let result = dispatcher.call("echo", &Arguments::new()).await;
    let expected = serde_json::to_string_pretty(&json!({"path": "", "recursive": false})).unwrap();
    assert_eq!(text(&result), expected);
}

#[tokio::test]
async fn backend_error_is_isolated() {
    let (dispatcher, _) = dispatcher();
    let failed = dispatcher.call("fail", &Arguments::new()).await;
    assert_eq!(
        text(&failed),
        "Error: Stub API error (HTTP 500): backend exploded politely"
    );

    let next = dispatcher.call("echo", &Arguments::new()).await;
    assert!(!text(&next).starts_with("Error:"));
}

#[tokio::test]
async fn panic_is_contained_and_payload_hidden() {
    let (dispatcher, _) = dispatcher();
    let result = dispatcher.call("explode", &Arguments::new()).await;
    assert_eq!(text(&result), "Error: Internal error while running tool 'explode'");
    assert!(!text(&result).contains("secret"));

    let next = dispatcher.call("echo", &Arguments::new()).await;
    assert!(!text(&next).starts_with("Error:"));
}
