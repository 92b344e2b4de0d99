//! Tool definition and tool call types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition advertised to the model.
///
/// Tools are discovered at runtime, so the orchestrator only ever sees a name,
/// a description and an input schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Function name
    pub name: String,
    /// Function description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for function parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn new(name: impl Into<String>, description: Option<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description,
            parameters,
        }
    }
}

/// A fully assembled tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider tool call id
    pub id: String,
    /// Tool name
    pub name: String,
    /// Parsed arguments
    pub arguments: Value,
}

impl ToolCall {
    /// Parse accumulated argument text into JSON.
    ///
    /// Empty input becomes `{}`. Text that is not valid JSON is kept as a
    /// string so schema validation can reject it with a readable reason.
    pub fn from_raw(id: impl Into<String>, name: impl Into<String>, raw_arguments: &str) -> Self {
        let raw = raw_arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}
