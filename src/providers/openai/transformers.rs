//! Request body construction for chat completions.

use serde_json::{Value, json};

use super::config::OpenAiConfig;
use crate::types::{ChatMessage, ContentPart, MessageContent, MessageRole, ToolDefinition};

/// Build the streaming chat-completions request body.
pub fn build_chat_request_body(
    config: &OpenAiConfig,
    messages: &[ChatMessage],
    tools: Option<&[ToolDefinition]>,
) -> Value {
    let mut body = json!({
        "model": config.model,
        "messages": convert_messages(messages),
        "stream": true,
        "stream_options": { "include_usage": true },
    });

    if let Some(max) = config.max_output_tokens {
        body["max_completion_tokens"] = json!(max);
    }

    if let Some(tools) = tools.filter(|t| !t.is_empty()) {
        body["tools"] = Value::Array(tools.iter().map(convert_tool).collect());
        body["tool_choice"] = json!("auto");
    }

    body
}

fn convert_tool(tool: &ToolDefinition) -> Value {
    let mut function = json!({
        "name": tool.name,
        "parameters": tool.parameters,
    });
    if let Some(description) = &tool.description {
        function["description"] = json!(description);
    }
    json!({ "type": "function", "function": function })
}

/// Convert internal messages to the OpenAI wire shape.
///
/// A tool message carrying several results expands into one `tool` message
/// per result.
pub fn convert_messages(messages: &[ChatMessage]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            MessageRole::System => out.push(json!({"role": "system", "content": message.text()})),
            MessageRole::User => out.push(json!({"role": "user", "content": message.text()})),
            MessageRole::Assistant => out.push(convert_assistant(message)),
            MessageRole::Tool => out.extend(convert_tool_results(&message.content)),
        }
    }
    out
}

fn convert_assistant(message: &ChatMessage) -> Value {
    let text = message.text();
    let tool_calls: Vec<Value> = message
        .content
        .tool_calls()
        .into_iter()
        .filter_map(|part| match part {
            ContentPart::ToolCall {
                tool_call_id,
                tool_name,
                arguments,
            } => Some(json!({
                "id": tool_call_id,
                "type": "function",
                "function": {
                    "name": tool_name,
                    "arguments": arguments_string(arguments),
                },
            })),
            _ => None,
        })
        .collect();

    if tool_calls.is_empty() {
        return json!({"role": "assistant", "content": text});
    }
    json!({
        "role": "assistant",
        "content": if text.is_empty() { Value::Null } else { Value::String(text) },
        "tool_calls": tool_calls,
    })
}

fn convert_tool_results(content: &MessageContent) -> Vec<Value> {
    let MessageContent::MultiModal(parts) = content else {
        return Vec::new();
    };
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::ToolResult {
                tool_call_id,
                output,
                ..
            } => Some(json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": match output {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })),
            _ => None,
        })
        .collect()
}

/// Arguments go over the wire as a JSON string.
fn arguments_string(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}
