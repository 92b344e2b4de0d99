//! UI message stream encoding.
//!
//! Converts orchestrator events into the chunk protocol consumed by AI-SDK
//! style chat front-ends (`x-vercel-ai-ui-message-stream: v1`). Each chunk is
//! one JSON object with a `type` field; the HTTP layer frames them as SSE.

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;

use super::GenerationStream;
use crate::error::GatewayError;
use crate::types::GenerationEvent;

/// UI message stream chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiMessageChunk {
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },
    StartStep,
    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
        dynamic: bool,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
        dynamic: bool,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
        dynamic: bool,
    },
    FinishStep,
    #[serde(rename_all = "camelCase")]
    Finish {
        #[serde(skip_serializing_if = "Option::is_none")]
        message_metadata: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
}

impl UiMessageChunk {
    /// Whether the chunk ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }
}

/// Options for UI message encoding.
#[derive(Debug, Clone)]
pub struct UiStreamOptions {
    /// Replace error details with a user-safe message.
    ///
    /// Default: `true`
    pub mask_errors: bool,

    /// Message used when `mask_errors` is `true`.
    ///
    /// If `None`, the error's own user-facing message is used.
    pub masked_error_message: Option<String>,

    /// Attach `{ finishReason, steps, usage }` to the `finish` chunk.
    ///
    /// This is how callers tell a natural finish from a step-limit cut-off.
    /// Default: `true`
    pub send_finish_metadata: bool,
}

impl Default for UiStreamOptions {
    fn default() -> Self {
        Self {
            mask_errors: true,
            masked_error_message: None,
            send_finish_metadata: true,
        }
    }
}

impl UiStreamOptions {
    /// Create options suitable for development (errors not masked).
    pub fn development() -> Self {
        Self {
            mask_errors: false,
            ..Default::default()
        }
    }

    /// Create options suitable for production (errors masked).
    pub fn production() -> Self {
        Self::default()
    }
}

/// Stateful encoder: tracks the open text part and terminal state.
#[derive(Debug)]
pub struct UiMessageEncoder {
    opts: UiStreamOptions,
    open_text: Option<String>,
    text_parts: usize,
    terminated: bool,
}

impl UiMessageEncoder {
    /// Create an encoder.
    pub fn new(opts: UiStreamOptions) -> Self {
        Self {
            opts,
            open_text: None,
            text_parts: 0,
            terminated: false,
        }
    }

    /// Whether a terminal chunk has been produced.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Encode one orchestrator item into zero or more chunks.
    ///
    /// Anything after a terminal chunk is dropped.
    pub fn encode(&mut self, item: Result<GenerationEvent, GatewayError>) -> Vec<UiMessageChunk> {
        if self.terminated {
            return Vec::new();
        }

        let mut out = Vec::new();
        match item {
            Ok(GenerationEvent::Start { message_id }) => {
                out.push(UiMessageChunk::Start { message_id });
            }
            Ok(GenerationEvent::StepStart { .. }) => {
                out.push(UiMessageChunk::StartStep);
            }
            Ok(GenerationEvent::TextDelta { delta }) => {
                if delta.is_empty() {
                    return out;
                }
                let id = match &self.open_text {
                    Some(id) => id.clone(),
                    None => {
                        self.text_parts += 1;
                        let id = format!("text-{}", self.text_parts);
                        out.push(UiMessageChunk::TextStart { id: id.clone() });
                        self.open_text = Some(id.clone());
                        id
                    }
                };
                out.push(UiMessageChunk::TextDelta { id, delta });
            }
            Ok(GenerationEvent::ToolCall {
                tool_call_id,
                tool_name,
                input,
            }) => {
                self.close_text(&mut out);
                out.push(UiMessageChunk::ToolInputAvailable {
                    tool_call_id,
                    tool_name,
                    input,
                    dynamic: true,
                });
            }
            Ok(GenerationEvent::ToolResult {
                tool_call_id,
                output,
                is_error,
                ..
            }) => {
                self.close_text(&mut out);
                if is_error {
                    let error_text = output
                        .get("message")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| output.to_string());
                    out.push(UiMessageChunk::ToolOutputError {
                        tool_call_id,
                        error_text,
                        dynamic: true,
                    });
                } else {
                    out.push(UiMessageChunk::ToolOutputAvailable {
                        tool_call_id,
                        output,
                        dynamic: true,
                    });
                }
            }
            Ok(GenerationEvent::StepFinish { .. }) => {
                self.close_text(&mut out);
                out.push(UiMessageChunk::FinishStep);
            }
            Ok(GenerationEvent::Finish {
                finish_reason,
                steps,
                usage,
            }) => {
                self.close_text(&mut out);
                let message_metadata = self.opts.send_finish_metadata.then(|| {
                    serde_json::json!({
                        "finishReason": finish_reason.as_str(),
                        "steps": steps,
                        "usage": usage,
                    })
                });
                out.push(UiMessageChunk::Finish { message_metadata });
            }
            Err(error) => {
                self.close_text(&mut out);
                out.push(self.error_chunk(&error));
            }
        }
        self.terminated = out.iter().any(UiMessageChunk::is_terminal);
        out
    }

    /// Chunks to emit when the source ends without a terminal event.
    pub fn finish_unterminated(&mut self) -> Vec<UiMessageChunk> {
        if self.terminated {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.close_text(&mut out);
        out.push(self.error_chunk(&GatewayError::StreamError(
            "generation ended without a terminal event".to_string(),
        )));
        self.terminated = true;
        out
    }

    /// Build the error chunk for `error`, honoring masking.
    pub fn error_chunk(&self, error: &GatewayError) -> UiMessageChunk {
        let error_text = if self.opts.mask_errors {
            self.opts
                .masked_error_message
                .clone()
                .unwrap_or_else(|| error.user_message())
        } else {
            error.to_string()
        };
        UiMessageChunk::Error { error_text }
    }

    fn close_text(&mut self, out: &mut Vec<UiMessageChunk>) {
        if let Some(id) = self.open_text.take() {
            out.push(UiMessageChunk::TextEnd { id });
        }
    }
}

/// Stream of UI chunks.
pub type UiChunkStream = Pin<Box<dyn Stream<Item = UiMessageChunk> + Send>>;

/// Encode a generation stream into UI message chunks.
///
/// The output always ends with exactly one terminal chunk (`finish` or
/// `error`), even if the source stops early. The source is polled to
/// exhaustion.
pub fn encode_ui_message_stream(stream: GenerationStream, opts: UiStreamOptions) -> UiChunkStream {
    let mut source = stream;
    let out = async_stream::stream! {
        let mut encoder = UiMessageEncoder::new(opts);
        while let Some(item) = source.next().await {
            // Keep draining after the terminal chunk so the response ends only
            // once the producer (and its cleanup) is done.
            for chunk in encoder.encode(item) {
                yield chunk;
            }
        }
        for chunk in encoder.finish_unterminated() {
            yield chunk;
        }
    };
    Box::pin(out)
}

/// Single-chunk stream for failures that happen before generation starts.
pub fn error_ui_message_stream(error: &GatewayError, opts: UiStreamOptions) -> UiChunkStream {
    let chunk = UiMessageEncoder::new(opts).error_chunk(error);
    Box::pin(futures::stream::iter(vec![chunk]))
}
