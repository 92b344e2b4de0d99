//! MCP (Model Context Protocol) tool access.
//!
//! A [`ToolSession`] is the per-request handle on a remote tool service: it
//! connects, lists the tools once, validates and routes invocations, and is
//! closed exactly once. The wire side sits behind two small traits so the
//! session logic does not depend on a particular MCP client:
//!
//! - [`McpConnector`]: opens and negotiates a connection
//! - [`McpTransport`]: lists tools, calls a tool, shuts down
//!
//! [`StreamableHttpConnector`] is the production connector, built on `rmcp`'s
//! streamable HTTP client.

mod http;
mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, ToolInvocationError};
use crate::types::ToolDefinition;

pub use http::{RmcpTransport, StreamableHttpConnector};
pub use session::ToolSession;

/// A tool as listed by the tool service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the arguments object.
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: Option<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description,
            input_schema,
        }
    }

    /// The definition handed to the model.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        )
    }
}

/// A negotiated MCP connection.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Fetch the full tool listing (all pages).
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError>;

    /// Call `name` with an arguments object.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ToolInvocationError>;

    /// Release the connection.
    async fn shutdown(&self) -> Result<(), GatewayError>;
}

/// Opens MCP connections.
#[async_trait]
pub trait McpConnector: Send + Sync {
    /// Connect to `endpoint` and complete the `initialize` handshake.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn McpTransport>, GatewayError>;
}
