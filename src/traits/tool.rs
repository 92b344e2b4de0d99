//! Tool resolver trait

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolInvocationError;

/// Executes tool calls by name.
///
/// The orchestrator never sees concrete tool types, so a tool service can add
/// tools without any change here.
#[async_trait]
pub trait ToolResolver: Send + Sync {
    /// Invoke `name` with `arguments` and return the structured result.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolInvocationError>;
}
