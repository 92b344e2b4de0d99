//! OpenAI-compatible chat client.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::OpenAiConfig;
use super::streaming::chat_stream_from_response;
use super::transformers::build_chat_request_body;
use crate::error::GatewayError;
use crate::streaming::ChatStream;
use crate::traits::ChatCapability;
use crate::types::{ChatMessage, ToolDefinition};

/// Streaming client for `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct OpenAiClient {
    config: Arc<OpenAiConfig>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl OpenAiClient {
    /// Validate the configuration and build a dedicated HTTP client.
    ///
    /// Idle connections are not pooled, so no socket outlives its request.
    pub fn new(config: OpenAiConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                GatewayError::ConfigurationError(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self::with_http_client(config, http_client))
    }

    /// Use a caller-provided HTTP client.
    pub fn with_http_client(config: OpenAiConfig, http_client: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            http_client,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl ChatCapability for OpenAiClient {
    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatStream, GatewayError> {
        let body = build_chat_request_body(&self.config, &messages, tools.as_deref());
        let headers = self.config.headers()?;

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.as_ref().map_or(0, Vec::len),
            "sending chat completions request"
        );

        let response = self
            .http_client
            .post(self.config.chat_completions_url())
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("chat completions returned HTTP {}", status.as_u16());
            return Err(GatewayError::api_error(
                status.as_u16(),
                error_message(&text),
            ));
        }

        Ok(chat_stream_from_response(response))
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}

/// Pull `error.message` out of an OpenAI error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
