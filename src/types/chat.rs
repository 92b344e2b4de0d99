//! Chat message and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{FinishReason, Usage};
use super::tools::ToolCall;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Plain text
    Text { text: String },
    /// A tool call made by the assistant
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
    },
    /// The result of a tool call
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        output: Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentPart {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool call part
    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self::ToolCall {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Text only
    Text(String),
    /// Mixed parts
    MultiModal(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::MultiModal(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Tool call parts, in order.
    pub fn tool_calls(&self) -> Vec<&ContentPart> {
        match self {
            Self::Text(_) => Vec::new(),
            Self::MultiModal(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::ToolCall { .. }))
                .collect(),
        }
    }
}

/// A conversation message.
///
/// Order in a history is chronological turn order; the orchestrator only ever
/// appends to its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ChatMessage {
    /// System message
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Assistant text message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Assistant message carrying text (possibly empty) and tool calls.
    pub fn assistant_with_tool_calls(text: impl Into<String>, calls: &[ToolCall]) -> Self {
        let text = text.into();
        if calls.is_empty() {
            return Self::assistant(text);
        }
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            parts.push(ContentPart::Text { text });
        }
        parts.extend(
            calls
                .iter()
                .map(|c| ContentPart::tool_call(c.id.clone(), c.name.clone(), c.arguments.clone())),
        );
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::MultiModal(parts),
        }
    }

    /// Tool result message
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: Value,
        is_error: bool,
    ) -> Self {
        Self {
            role: MessageRole::Tool,
            content: MessageContent::MultiModal(vec![ContentPart::ToolResult {
                tool_call_id: tool_call_id.into(),
                tool_name: tool_name.into(),
                output,
                is_error,
            }]),
        }
    }

    /// Concatenated text content.
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// Final response assembled by a provider at the end of one stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Provider response id
    pub id: Option<String>,
    /// Model id
    pub model: Option<String>,
    /// Full text content
    pub text: String,
    /// Tool calls requested in this response
    pub tool_calls: Vec<ToolCall>,
    /// Token usage
    pub usage: Option<Usage>,
    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}
