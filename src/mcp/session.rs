//! Per-request tool session.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::{McpConnector, McpTransport, ToolDescriptor};
use crate::error::{GatewayError, ToolInvocationError};
use crate::traits::ToolResolver;
use crate::types::ToolDefinition;

/// Listed tools plus their compiled argument validators.
struct ToolIndex {
    tools: Vec<ToolDescriptor>,
    validators: HashMap<String, Option<jsonschema::Validator>>,
}

impl ToolIndex {
    fn new(tools: Vec<ToolDescriptor>) -> Self {
        let validators = tools
            .iter()
            .map(|tool| (tool.name.clone(), compile_schema(tool)))
            .collect();
        Self { tools, validators }
    }
}

fn compile_schema(tool: &ToolDescriptor) -> Option<jsonschema::Validator> {
    if !tool.input_schema.is_object() {
        return None;
    }
    match jsonschema::validator_for(&tool.input_schema) {
        Ok(validator) => Some(validator),
        Err(e) => {
            tracing::warn!(tool = %tool.name, "invalid tool schema, skipping validation: {}", e);
            None
        }
    }
}

fn validate_args(validator: &jsonschema::Validator, instance: &Value) -> Result<(), String> {
    let msgs: Vec<String> = validator
        .iter_errors(instance)
        .take(3)
        .map(|err| format!("{} at {}", err, err.instance_path))
        .collect();
    if msgs.is_empty() {
        Ok(())
    } else {
        Err(msgs.join("; "))
    }
}

/// One connection to the tool service, scoped to a single request.
///
/// The session owns its transport. It is closed at most once; after
/// [`close`](Self::close) every invocation fails with
/// [`ToolInvocationError::SessionClosed`]. A session dropped without being
/// closed (the request future was cancelled) shuts its transport down on the
/// current runtime.
pub struct ToolSession {
    endpoint: String,
    transport: Arc<dyn McpTransport>,
    index: OnceCell<ToolIndex>,
    closed: AtomicBool,
}

impl std::fmt::Debug for ToolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSession")
            .field("endpoint", &self.endpoint)
            .field("listed", &self.index.initialized())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ToolSession {
    /// Connect to `endpoint` and negotiate.
    pub async fn open(connector: &dyn McpConnector, endpoint: &str) -> Result<Self, GatewayError> {
        let transport = connector.connect(endpoint).await?;
        tracing::debug!(endpoint, "tool session opened");
        Ok(Self::from_transport(endpoint, transport))
    }

    /// Wrap an already negotiated transport.
    pub fn from_transport(endpoint: impl Into<String>, transport: Box<dyn McpTransport>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport: Arc::from(transport),
            index: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Endpoint this session is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn index(&self) -> Result<&ToolIndex, GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::ConnectionError(
                "tool session is closed".to_string(),
            ));
        }
        self.index
            .get_or_try_init(|| async {
                let tools = self.transport.list_tools().await?;
                tracing::debug!(count = tools.len(), "tools listed");
                Ok::<_, GatewayError>(ToolIndex::new(tools))
            })
            .await
    }

    /// Tools offered by the service. Fetched once, then cached; may be empty.
    pub async fn list_tools(&self) -> Result<&[ToolDescriptor], GatewayError> {
        Ok(&self.index().await?.tools)
    }

    /// Tool definitions for the model.
    pub async fn tool_definitions(&self) -> Result<Vec<ToolDefinition>, GatewayError> {
        Ok(self
            .list_tools()
            .await?
            .iter()
            .map(ToolDescriptor::to_definition)
            .collect())
    }

    /// Invoke a listed tool.
    ///
    /// Arguments must be a JSON object matching the tool's input schema;
    /// otherwise the call is rejected before anything is sent.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolInvocationError> {
        if self.is_closed() {
            return Err(ToolInvocationError::SessionClosed);
        }
        let index = self
            .index()
            .await
            .map_err(|e| ToolInvocationError::Transport(e.to_string()))?;

        let Some(validator) = index.validators.get(name) else {
            return Err(ToolInvocationError::UnknownTool(name.to_string()));
        };

        let Value::Object(arguments) = arguments else {
            return Err(ToolInvocationError::InvalidArguments {
                tool: name.to_string(),
                reason: "arguments must be a JSON object".to_string(),
            });
        };

        if let Some(validator) = validator {
            let instance = Value::Object(arguments.clone());
            validate_args(validator, &instance).map_err(|reason| {
                ToolInvocationError::InvalidArguments {
                    tool: name.to_string(),
                    reason,
                }
            })?;
        }

        tracing::debug!(tool = name, "invoking tool");
        self.transport.call_tool(name, arguments).await
    }

    /// Release the connection. Later calls are no-ops returning `Ok(())`.
    pub async fn close(&self) -> Result<(), GatewayError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(endpoint = %self.endpoint, "closing tool session");
        self.transport.shutdown().await
    }

    /// Close and log a failure instead of returning it.
    pub async fn close_logged(&self) {
        if let Err(e) = self.close().await {
            tracing::error!("failed to close tool session: {}", e);
        }
    }
}

impl Drop for ToolSession {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let transport = self.transport.clone();
        let endpoint = std::mem::take(&mut self.endpoint);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(endpoint = %endpoint, "tool session dropped while open, closing");
                handle.spawn(async move {
                    if let Err(e) = transport.shutdown().await {
                        tracing::error!("failed to close tool session: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    endpoint = %endpoint,
                    "tool session dropped outside a runtime; not closed"
                );
            }
        }
    }
}

#[async_trait]
impl ToolResolver for ToolSession {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolInvocationError> {
        self.invoke(name, arguments).await
    }
}
