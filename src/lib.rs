//! # mcp-chat-gateway
//!
//! A streaming chat endpoint that lets an LLM call tools served by an MCP
//! server, within a bounded number of generation steps.
//!
//! One request flows through four pieces:
//!
//! - **Tool session** ([`mcp::ToolSession`]): one MCP connection per request,
//!   tool discovery, argument validation, invocation, close.
//! - **Orchestrator** ([`orchestrator::Orchestrator`]): generate, run
//!   requested tools, feed results back, repeat up to the step ceiling.
//! - **Stream adapter** ([`streaming`]): exactly-once terminal hooks and the
//!   UI message stream encoding.
//! - **Request handler** ([`server`]): `POST /api/search` on axum.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcp_chat_gateway::prelude::*;
//!
//! # async fn run() -> Result<(), GatewayError> {
//! let model = OpenAiClient::new(OpenAiConfig::new("sk-...".to_string().into()))?;
//! let state = AppState {
//!     model: Arc::new(model),
//!     connector: Arc::new(StreamableHttpConnector::new()),
//!     mcp_endpoint: "http://localhost:8787/mcp".into(),
//!     orchestrator: OrchestratorOptions::default(),
//!     ui: UiStreamOptions::default(),
//! };
//! let app = router(state);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod mcp;
pub mod orchestrator;
pub mod providers;
pub mod server;
pub mod streaming;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use error::{GatewayError, ToolInvocationError};

/// Common imports.
pub mod prelude {
    pub use crate::error::{GatewayError, ToolInvocationError};
    pub use crate::mcp::{McpConnector, McpTransport, StreamableHttpConnector, ToolSession};
    pub use crate::orchestrator::{GenerationSummary, Orchestrator, OrchestratorOptions};
    pub use crate::providers::openai::{OpenAiClient, OpenAiConfig};
    pub use crate::server::{AppState, router};
    pub use crate::streaming::{StreamFinalizer, UiMessageChunk, UiStreamOptions};
    pub use crate::traits::{ChatCapability, ToolResolver};
    pub use crate::types::{ChatMessage, FinishReason, GenerationEvent, ToolDefinition, Usage};
}
