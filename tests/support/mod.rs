//! Fakes shared by the endpoint tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use mcp_chat_gateway::mcp::{McpConnector, McpTransport, ToolDescriptor};
use mcp_chat_gateway::streaming::ChatStream;
use mcp_chat_gateway::traits::ChatCapability;
use mcp_chat_gateway::types::{
    ChatMessage, ChatResponse, ChatStreamEvent, FinishReason, ToolDefinition, Usage,
};
use mcp_chat_gateway::{GatewayError, ToolInvocationError};
use serde_json::{Map, Value, json};

/// Observable side effects of one fake tool service.
#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub connects: Arc<AtomicUsize>,
    pub tool_calls: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl Counters {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn tool_calls(&self) -> usize {
        self.tool_calls.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

pub fn search_site_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "search_site",
        Some("Search the website content".into()),
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }),
    )
}

/// How the fake tool service answers `tools/list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Tools,
    Fails,
    Hangs,
}

struct FakeTransport {
    counters: Counters,
    listing: Listing,
}

#[async_trait]
impl McpTransport for FakeTransport {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        match self.listing {
            Listing::Tools => Ok(vec![search_site_descriptor()]),
            Listing::Fails => Err(GatewayError::ConnectionError(
                "tools/list failed: internal error".into(),
            )),
            Listing::Hangs => std::future::pending().await,
        }
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ToolInvocationError> {
        self.counters.tool_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "content": [{
                "type": "text",
                "text": format!("{name} results for {}: consulting, workshops", arguments["query"])
            }],
            "isError": false
        }))
    }

    async fn shutdown(&self) -> Result<(), GatewayError> {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out [`FakeTransport`]s, or refusing to connect.
pub struct FakeConnector {
    pub counters: Counters,
    pub reachable: bool,
    pub listing: Listing,
}

impl FakeConnector {
    pub fn reachable(counters: Counters) -> Self {
        Self {
            counters,
            reachable: true,
            listing: Listing::Tools,
        }
    }

    pub fn unreachable(counters: Counters) -> Self {
        Self {
            counters,
            reachable: false,
            listing: Listing::Tools,
        }
    }

    pub fn with_listing(mut self, listing: Listing) -> Self {
        self.listing = listing;
        self
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn McpTransport>, GatewayError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(GatewayError::ConnectionError(format!(
                "connection refused: {endpoint}"
            )));
        }
        Ok(Box::new(FakeTransport {
            counters: self.counters.clone(),
            listing: self.listing,
        }))
    }
}

/// Model that replays scripted rounds; the last round repeats.
pub struct ScriptedModel {
    rounds: Vec<Vec<ChatStreamEvent>>,
    hang: bool,
    pub calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(rounds: Vec<Vec<ChatStreamEvent>>) -> Self {
        Self {
            rounds,
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A model whose stream never produces anything.
    pub fn hanging() -> Self {
        Self {
            rounds: Vec::new(),
            hang: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatCapability for ScriptedModel {
    async fn chat_stream(
        &self,
        _messages: Vec<ChatMessage>,
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatStream, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            return Ok(Box::pin(futures::stream::pending::<
                Result<ChatStreamEvent, GatewayError>,
            >()));
        }
        let round = self
            .rounds
            .get(n.min(self.rounds.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(round.into_iter().map(Ok))))
    }
}

fn stream_end(text: &str, reason: FinishReason, usage: Usage) -> ChatStreamEvent {
    ChatStreamEvent::StreamEnd {
        response: ChatResponse {
            text: text.to_string(),
            usage: Some(usage),
            finish_reason: Some(reason),
            ..Default::default()
        },
    }
}

pub fn text_round(text: &str) -> Vec<ChatStreamEvent> {
    vec![
        ChatStreamEvent::ContentDelta {
            delta: text.to_string(),
            index: Some(0),
        },
        stream_end(text, FinishReason::Stop, Usage::new(20, 5)),
    ]
}

pub fn search_round(id: &str, query: &str) -> Vec<ChatStreamEvent> {
    vec![
        ChatStreamEvent::ToolCallDelta {
            id: id.to_string(),
            function_name: Some("search_site".to_string()),
            arguments_delta: Some(json!({ "query": query }).to_string()),
            index: Some(0),
        },
        stream_end("", FinishReason::ToolCalls, Usage::new(10, 3)),
    ]
}

pub fn search_request(question: &str) -> Request<Body> {
    let body = json!({
        "messages": [{
            "id": "m1",
            "role": "user",
            "parts": [{"type": "text", "text": question}]
        }]
    });
    Request::builder()
        .method("POST")
        .uri("/api/search")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Collect an SSE body into its `data:` payloads.
pub async fn sse_payloads(response: Response<Body>) -> Vec<String> {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    text.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(str::to_string)
        .collect()
}

/// JSON chunks, with the trailing `[DONE]` checked and removed.
pub fn ui_chunks(payloads: &[String]) -> Vec<Value> {
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    payloads[..payloads.len() - 1]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect()
}

pub fn chunk_types(chunks: &[Value]) -> Vec<String> {
    chunks
        .iter()
        .map(|c| c["type"].as_str().unwrap_or_default().to_string())
        .collect()
}
