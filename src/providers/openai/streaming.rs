//! OpenAI streaming implementation using eventsource-stream.
//!
//! Chat-completions streams identify a tool call by its id only in the first
//! delta; later deltas carry just the `index`. The converter keeps the
//! index → id mapping so every emitted `ToolCallDelta` has a stable id.

use std::collections::HashMap;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::streaming::ChatStream;
use crate::types::{ChatResponse, ChatStreamEvent, FinishReason, ResponseMetadata, Usage};

/// OpenAI stream event structure
#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamEvent {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiStreamUsage>,
}

/// OpenAI stream choice
#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChoice {
    index: Option<usize>,
    delta: Option<OpenAiStreamDelta>,
    finish_reason: Option<String>,
}

/// OpenAI stream delta
#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

/// OpenAI tool call delta
#[derive(Debug, Clone, Deserialize)]
struct OpenAiToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<OpenAiFunctionCallDelta>,
}

/// OpenAI function call delta
#[derive(Debug, Clone, Deserialize)]
struct OpenAiFunctionCallDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// OpenAI usage information
#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Stateful converter from SSE payloads to `ChatStreamEvent`s.
#[derive(Debug, Default)]
pub struct OpenAiEventConverter {
    stream_started: bool,
    ended: bool,
    tool_ids: HashMap<usize, String>,
    text: String,
    id: Option<String>,
    model: Option<String>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

impl OpenAiEventConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one SSE `data` payload into zero or more events.
    pub fn convert(&mut self, data: &str) -> Vec<Result<ChatStreamEvent, GatewayError>> {
        let data = data.trim();
        if data.is_empty() || self.ended {
            return Vec::new();
        }
        if data == "[DONE]" {
            return self.finish().into_iter().map(Ok).collect();
        }

        let value: serde_json::Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(e) => {
                return vec![Err(GatewayError::ParseError(format!(
                    "Failed to parse OpenAI event: {e}"
                )))];
            }
        };
        // Some gateways forward provider errors inside the stream.
        if let Some(message) = embedded_error(&value) {
            return vec![Err(GatewayError::ProviderError(message))];
        }
        let event: OpenAiStreamEvent = match serde_json::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                return vec![Err(GatewayError::ParseError(format!(
                    "Unexpected OpenAI event shape: {e}"
                )))];
            }
        };

        let mut out = Vec::new();
        if !self.stream_started {
            self.stream_started = true;
            self.id = event.id.clone();
            self.model = event.model.clone();
            out.push(Ok(ChatStreamEvent::StreamStart {
                metadata: ResponseMetadata {
                    id: event.id.clone(),
                    model: event.model.clone(),
                    created: Some(chrono::Utc::now()),
                    provider: "openai".to_string(),
                },
            }));
        }

        for choice in event.choices {
            if let Some(delta) = choice.delta {
                if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                    self.text.push_str(&content);
                    out.push(Ok(ChatStreamEvent::ContentDelta {
                        delta: content,
                        index: choice.index,
                    }));
                }
                for call in delta.tool_calls.unwrap_or_default() {
                    if let Some(ev) = self.tool_call_delta(call) {
                        out.push(Ok(ev));
                    }
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(FinishReason::from_openai(&reason));
            }
        }

        if let Some(usage) = event.usage {
            let prompt = usage.prompt_tokens.unwrap_or(0);
            let completion = usage.completion_tokens.unwrap_or(0);
            let usage = Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: usage
                    .total_tokens
                    .unwrap_or_else(|| prompt.saturating_add(completion)),
            };
            self.usage = Some(usage);
            out.push(Ok(ChatStreamEvent::UsageUpdate { usage }));
        }

        out
    }

    fn tool_call_delta(&mut self, call: OpenAiToolCallDelta) -> Option<ChatStreamEvent> {
        let index = call.index.unwrap_or(0);
        let id = match call.id.filter(|id| !id.is_empty()) {
            Some(id) => {
                self.tool_ids.insert(index, id.clone());
                id
            }
            None => match self.tool_ids.get(&index) {
                Some(id) => id.clone(),
                None => {
                    tracing::warn!(index, "tool call delta before its id, skipping");
                    return None;
                }
            },
        };
        let (function_name, arguments_delta) = match call.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        Some(ChatStreamEvent::ToolCallDelta {
            id,
            function_name,
            arguments_delta,
            index: Some(index),
        })
    }

    /// Build the `StreamEnd` event. Returns `None` once already ended.
    pub fn finish(&mut self) -> Option<ChatStreamEvent> {
        if self.ended {
            return None;
        }
        self.ended = true;
        Some(ChatStreamEvent::StreamEnd {
            response: ChatResponse {
                id: self.id.take(),
                model: self.model.take(),
                text: std::mem::take(&mut self.text),
                tool_calls: Vec::new(),
                usage: self.usage,
                finish_reason: self.finish_reason,
            },
        })
    }
}

fn embedded_error(value: &serde_json::Value) -> Option<String> {
    let error = value.get("error").filter(|e| !e.is_null())?;
    Some(
        error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    )
}

/// Turn a successful streaming response into a `ChatStream`.
///
/// A stream that closes without `[DONE]` still ends with `StreamEnd`.
pub fn chat_stream_from_response(response: reqwest::Response) -> ChatStream {
    let mut events = Box::pin(response.bytes_stream().eventsource());
    let stream = async_stream::stream! {
        let mut converter = OpenAiEventConverter::new();
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let converted = converter.convert(&event.data);
                    let failed = converted.iter().any(|r| r.is_err());
                    for ev in converted {
                        yield ev;
                    }
                    if failed {
                        return;
                    }
                }
                Err(e) => {
                    yield Err(GatewayError::StreamError(format!("SSE parsing error: {e}")));
                    return;
                }
            }
        }
        if let Some(end) = converter.finish() {
            yield Ok(end);
        }
    };
    Box::pin(stream)
}
