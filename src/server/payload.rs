//! Inbound request parsing.
//!
//! Accepted message shapes:
//! - `{ "role": "user", "content": "text" }`
//! - `{ "role": "user", "content": [{ "type": "text", "text": "..." }] }`
//! - UI messages: `{ "id": "...", "role": "assistant", "parts": [...] }`
//!
//! For UI messages, `text` parts are kept and completed tool parts
//! (`dynamic-tool` or `tool-<name>`) become an assistant tool call followed by
//! its tool result. Other part types (`step-start`, `reasoning`, files) are
//! ignored.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::GatewayError;
use crate::types::{ChatMessage, MessageRole, ToolCall};

#[derive(Debug, Deserialize)]
struct SearchRequest {
    messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    role: String,
    #[serde(default)]
    content: Option<InboundContent>,
    #[serde(default)]
    parts: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InboundContent {
    Text(String),
    Parts(Vec<Value>),
}

fn malformed(msg: impl Into<String>) -> GatewayError {
    GatewayError::MalformedRequest(msg.into())
}

/// Parse a `{ "messages": [...] }` body into the conversation history.
pub fn parse_search_request(body: &[u8]) -> Result<Vec<ChatMessage>, GatewayError> {
    let request: SearchRequest = serde_json::from_slice(body)
        .map_err(|e| malformed(format!("invalid request body: {e}")))?;

    if request.messages.is_empty() {
        return Err(malformed("`messages` must not be empty"));
    }

    let mut out = Vec::with_capacity(request.messages.len());
    for (i, message) in request.messages.into_iter().enumerate() {
        convert_message(i, message, &mut out)?;
    }
    if out.is_empty() {
        return Err(malformed("no usable messages"));
    }
    Ok(out)
}

fn parse_role(i: usize, role: &str) -> Result<MessageRole, GatewayError> {
    match role {
        "system" => Ok(MessageRole::System),
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        "tool" => Ok(MessageRole::Tool),
        other => Err(malformed(format!("messages[{i}]: unknown role `{other}`"))),
    }
}

fn convert_message(
    i: usize,
    message: InboundMessage,
    out: &mut Vec<ChatMessage>,
) -> Result<(), GatewayError> {
    let role = parse_role(i, &message.role)?;

    match (message.content, message.parts) {
        (Some(InboundContent::Text(text)), _) => {
            out.push(text_message(i, role, text)?);
            Ok(())
        }
        (Some(InboundContent::Parts(parts)), _) => {
            let text = text_of_parts(i, &parts)?;
            out.push(text_message(i, role, text)?);
            Ok(())
        }
        (None, Some(parts)) => convert_ui_parts(i, role, &parts, out),
        (None, None) => Err(malformed(format!(
            "messages[{i}]: expected `content` or `parts`"
        ))),
    }
}

fn text_message(i: usize, role: MessageRole, text: String) -> Result<ChatMessage, GatewayError> {
    match role {
        MessageRole::System => Ok(ChatMessage::system(text)),
        MessageRole::User => Ok(ChatMessage::user(text)),
        MessageRole::Assistant => Ok(ChatMessage::assistant(text)),
        MessageRole::Tool => Err(malformed(format!(
            "messages[{i}]: tool messages must come from tool parts"
        ))),
    }
}

fn part_type<'a>(i: usize, part: &'a Value) -> Result<&'a str, GatewayError> {
    part.get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("messages[{i}]: every part needs a string `type`")))
}

fn part_text(i: usize, part: &Value) -> Result<String, GatewayError> {
    part.get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(format!("messages[{i}]: text part without `text`")))
}

fn text_of_parts(i: usize, parts: &[Value]) -> Result<String, GatewayError> {
    let mut text = String::new();
    for part in parts {
        if part_type(i, part)? == "text" {
            text.push_str(&part_text(i, part)?);
        }
    }
    Ok(text)
}

/// A completed tool part from an earlier turn.
struct ToolPart {
    call: ToolCall,
    output: Value,
    is_error: bool,
}

fn tool_part(i: usize, kind: &str, part: &Value) -> Result<Option<ToolPart>, GatewayError> {
    let name = if kind == "dynamic-tool" {
        part.get("toolName").and_then(Value::as_str)
    } else {
        kind.strip_prefix("tool-")
    };
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return Err(malformed(format!("messages[{i}]: tool part without a name")));
    };
    let Some(id) = part.get("toolCallId").and_then(Value::as_str) else {
        return Err(malformed(format!(
            "messages[{i}]: tool part without `toolCallId`"
        )));
    };

    let (output, is_error) = match part.get("state").and_then(Value::as_str) {
        Some("output-available") => (part.get("output").cloned().unwrap_or(Value::Null), false),
        Some("output-error") => {
            let message = part
                .get("errorText")
                .and_then(Value::as_str)
                .unwrap_or("tool error");
            (json!({"error": "tool_error", "message": message}), true)
        }
        // Calls still in flight carry no result; the model never saw them complete.
        _ => return Ok(None),
    };

    let arguments = match part.get("input") {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    };

    Ok(Some(ToolPart {
        call: ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        },
        output,
        is_error,
    }))
}

/// Split an assistant UI message into text / tool-call / tool-result blocks.
fn convert_ui_parts(
    i: usize,
    role: MessageRole,
    parts: &[Value],
    out: &mut Vec<ChatMessage>,
) -> Result<(), GatewayError> {
    if role != MessageRole::Assistant {
        let text = text_of_parts(i, parts)?;
        out.push(text_message(i, role, text)?);
        return Ok(());
    }

    let mut text = String::new();
    let mut tools: Vec<ToolPart> = Vec::new();

    for part in parts {
        let kind = part_type(i, part)?;
        if kind == "text" {
            if !tools.is_empty() {
                flush_block(&mut text, &mut tools, out);
            }
            text.push_str(&part_text(i, part)?);
        } else if kind == "dynamic-tool" || kind.starts_with("tool-") {
            if let Some(tool) = tool_part(i, kind, part)? {
                tools.push(tool);
            }
        }
    }

    if !text.is_empty() || !tools.is_empty() {
        flush_block(&mut text, &mut tools, out);
    }
    Ok(())
}

fn flush_block(text: &mut String, tools: &mut Vec<ToolPart>, out: &mut Vec<ChatMessage>) {
    let calls: Vec<ToolCall> = tools.iter().map(|t| t.call.clone()).collect();
    out.push(ChatMessage::assistant_with_tool_calls(
        std::mem::take(text),
        &calls,
    ));
    for tool in tools.drain(..) {
        out.push(ChatMessage::tool_result(
            tool.call.id,
            tool.call.name,
            tool.output,
            tool.is_error,
        ));
    }
}
