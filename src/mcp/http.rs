//! Streamable HTTP transport on top of `rmcp`.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParam, ClientCapabilities, ClientInfo, ErrorCode, Implementation,
};
use rmcp::service::{Peer, RoleClient, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{ServiceError, ServiceExt};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{McpConnector, McpTransport, ToolDescriptor};
use crate::error::{GatewayError, ToolInvocationError};

/// Connects to MCP servers over streamable HTTP.
#[derive(Debug, Clone)]
pub struct StreamableHttpConnector {
    client_name: String,
    client_version: String,
    connect_timeout: Duration,
}

impl Default for StreamableHttpConnector {
    fn default() -> Self {
        Self {
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl StreamableHttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the connect + `initialize` handshake.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn client_info(&self) -> ClientInfo {
        ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: self.client_name.clone(),
                title: None,
                version: self.client_version.clone(),
                website_url: None,
                icons: None,
            },
        }
    }
}

#[async_trait]
impl McpConnector for StreamableHttpConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn McpTransport>, GatewayError> {
        let transport = StreamableHttpClientTransport::from_uri(endpoint.to_string());
        let handshake = self.client_info().serve(transport);
        let service = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                GatewayError::ConnectionError(format!(
                    "MCP handshake with {endpoint} timed out after {}s",
                    self.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                GatewayError::ConnectionError(format!("MCP handshake with {endpoint} failed: {e}"))
            })?;

        if let Some(info) = service.peer_info() {
            tracing::debug!(server = %info.server_info.name, "MCP server connected");
        }
        Ok(Box::new(RmcpTransport::new(service)))
    }
}

/// A running `rmcp` client service.
pub struct RmcpTransport {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
}

impl RmcpTransport {
    pub fn new(service: RunningService<RoleClient, ClientInfo>) -> Self {
        Self {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        }
    }
}

fn map_service_error(tool: &str, error: ServiceError) -> ToolInvocationError {
    match error {
        ServiceError::TransportClosed => ToolInvocationError::TransportClosed,
        ServiceError::McpError(data) if data.code == ErrorCode::INVALID_PARAMS => {
            ToolInvocationError::InvalidArguments {
                tool: tool.to_string(),
                reason: data.message.to_string(),
            }
        }
        ServiceError::McpError(data) if data.code == ErrorCode::METHOD_NOT_FOUND => {
            ToolInvocationError::UnknownTool(tool.to_string())
        }
        ServiceError::McpError(data) => ToolInvocationError::Execution {
            tool: tool.to_string(),
            message: data.message.to_string(),
        },
        other => ToolInvocationError::Transport(other.to_string()),
    }
}

/// Text of an `isError` result, for the error message.
fn error_text(result: &Value) -> String {
    let text: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    if text.is_empty() {
        "tool reported an error".to_string()
    } else {
        text.join("\n")
    }
}

#[async_trait]
impl McpTransport for RmcpTransport {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| GatewayError::ConnectionError(format!("Failed to list MCP tools: {e}")))?;

        Ok(tools
            .into_iter()
            .map(|t| ToolDescriptor {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()),
                input_schema: Value::Object((*t.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ToolInvocationError> {
        let result = self
            .peer
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| map_service_error(name, e))?;

        let is_error = result.is_error.unwrap_or(false);
        let value = serde_json::to_value(&result).map_err(|e| ToolInvocationError::Execution {
            tool: name.to_string(),
            message: format!("unserializable tool result: {e}"),
        })?;

        if is_error {
            return Err(ToolInvocationError::Execution {
                tool: name.to_string(),
                message: error_text(&value),
            });
        }
        Ok(value)
    }

    async fn shutdown(&self) -> Result<(), GatewayError> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        service
            .cancel()
            .await
            .map(|reason| tracing::debug!("MCP client stopped: {:?}", reason))
            .map_err(|e| GatewayError::CleanupError(format!("MCP client shutdown failed: {e}")))
    }
}
