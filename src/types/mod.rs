//! Core types shared by the provider, orchestrator and server layers.

pub mod chat;
pub mod common;
pub mod streaming;
pub mod tools;

pub use chat::{ChatMessage, ChatResponse, ContentPart, MessageContent, MessageRole};
pub use common::{FinishReason, ResponseMetadata, Usage};
pub use streaming::{ChatStreamEvent, GenerationEvent};
pub use tools::{ToolCall, ToolDefinition};
