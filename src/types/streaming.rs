//! Streaming event types
//!
//! Two layers of events flow through the gateway:
//! - `ChatStreamEvent`: what one provider stream produces (one model round)
//! - `GenerationEvent`: what the orchestrator produces across all rounds

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chat::ChatResponse;
use super::common::{FinishReason, ResponseMetadata, Usage};

/// Provider stream event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatStreamEvent {
    /// Stream start event with metadata
    StreamStart {
        /// Response metadata
        metadata: ResponseMetadata,
    },
    /// Content delta (incremental text)
    ContentDelta {
        /// The incremental text content
        delta: String,
        /// Index of the choice
        index: Option<usize>,
    },
    /// Tool call delta
    ToolCallDelta {
        /// Tool call ID
        id: String,
        /// Function name (if this is the start of a tool call)
        function_name: Option<String>,
        /// Incremental arguments
        arguments_delta: Option<String>,
        /// Index of the tool call within the choice
        index: Option<usize>,
    },
    /// Usage statistics update
    UsageUpdate {
        /// Token usage information
        usage: Usage,
    },
    /// Stream end event with final response
    StreamEnd {
        /// Final response
        response: ChatResponse,
    },
}

/// Orchestrator event, in strict production order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GenerationEvent {
    /// First event of every generation.
    Start {
        /// Id of the assistant message being produced
        message_id: String,
    },
    /// A model round begins (1-based).
    StepStart { step: usize },
    /// Incremental answer text.
    TextDelta { delta: String },
    /// The model requested a tool.
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    /// A tool call completed (successfully or not).
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        output: Value,
        is_error: bool,
    },
    /// A model round ended.
    StepFinish {
        step: usize,
        finish_reason: FinishReason,
        usage: Option<Usage>,
    },
    /// Terminal success event.
    Finish {
        finish_reason: FinishReason,
        steps: usize,
        usage: Usage,
    },
}

impl GenerationEvent {
    /// Whether this is the terminal success event.
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}
