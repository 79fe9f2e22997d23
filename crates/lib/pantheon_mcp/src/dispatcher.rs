//! Turns a tool call into exactly one [`ToolResult`].
//!
//! Unknown tools, schema violations, backend errors and panics inside a
//! backend operation all come back as ordinary text content. Nothing raised
//! below this boundary reaches the transport.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use pantheon_core::backend::{Arguments, Backend};
use tracing::{debug, error, info, warn};

use crate::protocol::ToolResult;
use crate::registry::ToolRegistry;

pub struct Dispatcher<B: Backend> {
    registry: Arc<ToolRegistry<B::Operation>>,
    backend: Arc<B>,
}

impl<B: Backend> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(registry: Arc<ToolRegistry<B::Operation>>, backend: Arc<B>) -> Self {
        Self { registry, backend }
    }

    /// Run one call. Never fails; failures are rendered as `Error: ...`.
    pub async fn call(&self, name: &str, raw: &Arguments) -> ToolResult {
        let (operation, arguments) = match self.registry.prepare(name, raw) {
            Ok(prepared) => prepared,
            Err(rejection) => {
                warn!(tool = name, error = %rejection, "tool call rejected");
                return ToolResult::error(rejection);
            }
        };

        debug!(tool = name, ?operation, "invoking backend");
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.backend.invoke(operation, arguments))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => {
                info!(tool = name, elapsed_ms, "tool call succeeded");
                match serde_json::to_string_pretty(&value) {
                    Ok(text) => ToolResult::text(text),
                    Err(e) => ToolResult::error(format!("failed to encode result: {e}")),
                }
            }
            Ok(Err(e)) => {
                warn!(tool = name, elapsed_ms, error = %e, "tool call failed");
                ToolResult::error(e)
            }
            Err(_) => {
                error!(tool = name, elapsed_ms, "tool handler panicked");
                ToolResult::error(format!("Internal error while running tool '{name}'"))
            }
        }
    }
}

#[cfg(test)]
mod tests;
