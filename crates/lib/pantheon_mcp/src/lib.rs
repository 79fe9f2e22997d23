//! MCP stdio server for Pantheon storage integrations.
//!
//! Layers, leaves first: [`transport`] frames JSON-RPC lines, [`schema`] and
//! [`registry`] describe and validate the tool catalog, [`dispatcher`] turns
//! a call into a [`protocol::ToolResult`], and [`server`] owns the lifecycle.

pub mod catalog;
pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use protocol::{ContentItem, ServerInfo, ToolResult};
pub use registry::{RegistryError, ToolRegistry};
pub use server::{McpServer, ServerError, ServerState};
pub use transport::Transport;
