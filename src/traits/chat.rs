//! Chat capability trait

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::streaming::ChatStream;
use crate::types::{ChatMessage, ToolDefinition};

/// Streaming chat model.
///
/// One call is one model round: the provider receives the full history plus
/// the tool set and answers with an incremental event stream.
#[async_trait]
pub trait ChatCapability: Send + Sync {
    /// Start one streaming round.
    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatStream, GatewayError>;

    /// Provider id used in logs.
    fn provider_id(&self) -> &str {
        "unknown"
    }
}
