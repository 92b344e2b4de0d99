//! Orchestrator loop tests with scripted models and resolvers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};

use super::*;
use crate::error::{GatewayError, ToolInvocationError};
use crate::streaming::ChatStream;
use crate::types::{
    ChatResponse, ChatStreamEvent, FinishReason, GenerationEvent, MessageRole, Usage,
};

// ============================================================================
// Mock Implementations
// ============================================================================

/// One scripted provider round.
#[derive(Clone)]
enum Script {
    Events(Vec<Result<ChatStreamEvent, GatewayError>>),
    Fail(GatewayError),
    Hang,
}

/// Replays scripted rounds; the last script repeats once the list runs out.
struct ScriptedModel {
    scripts: Vec<Script>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedModel {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ChatCapability for ScriptedModel {
    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatStream, GatewayError> {
        let idx = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages);
            calls.len() - 1
        };
        let script = self
            .scripts
            .get(idx)
            .or_else(|| self.scripts.last())
            .cloned()
            .unwrap_or(Script::Events(Vec::new()));
        match script {
            Script::Events(events) => Ok(Box::pin(futures::stream::iter(events))),
            Script::Fail(e) => Err(e),
            Script::Hang => Ok(Box::pin(futures::stream::pending::<
                Result<ChatStreamEvent, GatewayError>,
            >())),
        }
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

/// Resolver returning canned results per tool name.
#[derive(Default)]
struct MapResolver {
    results: HashMap<String, Result<Value, ToolInvocationError>>,
    calls: Mutex<Vec<(String, Value)>>,
    delay: Option<Duration>,
}

impl MapResolver {
    fn with(mut self, name: &str, result: Result<Value, ToolInvocationError>) -> Self {
        self.results.insert(name.to_string(), result);
        self
    }
}

#[async_trait]
impl ToolResolver for MapResolver {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolInvocationError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(ToolInvocationError::UnknownTool(name.to_string())))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn text_round(parts: &[&str], reason: FinishReason) -> Script {
    let mut events: Vec<Result<ChatStreamEvent, GatewayError>> = parts
        .iter()
        .map(|p| {
            Ok(ChatStreamEvent::ContentDelta {
                delta: p.to_string(),
                index: Some(0),
            })
        })
        .collect();
    events.push(Ok(ChatStreamEvent::StreamEnd {
        response: ChatResponse {
            text: parts.concat(),
            usage: Some(Usage::new(10, 5)),
            finish_reason: Some(reason),
            ..Default::default()
        },
    }));
    Script::Events(events)
}

fn tool_round(id: &str, name: &str, args_chunks: &[&str]) -> Script {
    let mut events = Vec::new();
    for (i, chunk) in args_chunks.iter().enumerate() {
        events.push(Ok(ChatStreamEvent::ToolCallDelta {
            id: id.to_string(),
            function_name: (i == 0).then(|| name.to_string()),
            arguments_delta: Some(chunk.to_string()),
            index: Some(0),
        }));
    }
    events.push(Ok(ChatStreamEvent::StreamEnd {
        response: ChatResponse {
            usage: Some(Usage::new(8, 2)),
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        },
    }));
    Script::Events(events)
}

struct Counters {
    finished: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    summary: Arc<Mutex<Option<GenerationSummary>>>,
    error: Arc<Mutex<Option<GatewayError>>>,
}

fn finalizer() -> (StreamFinalizer, Counters) {
    let counters = Counters {
        finished: Arc::new(AtomicUsize::new(0)),
        failed: Arc::new(AtomicUsize::new(0)),
        summary: Arc::new(Mutex::new(None)),
        error: Arc::new(Mutex::new(None)),
    };
    let (f, s) = (counters.finished.clone(), counters.summary.clone());
    let (e, err) = (counters.failed.clone(), counters.error.clone());
    let finalizer = StreamFinalizer::new()
        .on_finish(move |summary| async move {
            f.fetch_add(1, Ordering::SeqCst);
            *s.lock().unwrap() = Some(summary);
        })
        .on_error(move |error| async move {
            e.fetch_add(1, Ordering::SeqCst);
            *err.lock().unwrap() = Some(error);
        });
    (finalizer, counters)
}

fn search_tool() -> ToolDefinition {
    ToolDefinition::new(
        "search_site",
        Some("Search the site".into()),
        json!({"type": "object", "properties": {"query": {"type": "string"}}}),
    )
}

async fn collect(
    stream: crate::streaming::GenerationStream,
) -> Vec<Result<GenerationEvent, GatewayError>> {
    stream.collect().await
}

fn ok_events(items: &[Result<GenerationEvent, GatewayError>]) -> Vec<GenerationEvent> {
    items.iter().filter_map(|i| i.as_ref().ok().cloned()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn final_answer_streams_text_and_finishes_once() {
    let model = Arc::new(ScriptedModel::new(vec![text_round(
        &["We offer ", "X and Y."],
        FinishReason::Stop,
    )]));
    let (fin, counters) = finalizer();

    let items = collect(
        Orchestrator::new(model.clone(), vec![search_tool()]).run_stream_owned(
            vec![ChatMessage::user("What services do you offer?")],
            Arc::new(MapResolver::default()),
            fin,
        ),
    )
    .await;

    assert!(items.iter().all(|i| i.is_ok()));
    let events = ok_events(&items);
    assert!(matches!(events[0], GenerationEvent::Start { .. }));
    assert_eq!(events[1], GenerationEvent::StepStart { step: 1 });
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            GenerationEvent::TextDelta { delta } => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "We offer X and Y.");
    assert_eq!(
        events.last(),
        Some(&GenerationEvent::Finish {
            finish_reason: FinishReason::Stop,
            steps: 1,
            usage: Usage::new(10, 5),
        })
    );

    assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
    assert_eq!(counters.failed.load(Ordering::SeqCst), 0);
    let summary = counters.summary.lock().unwrap().clone().unwrap();
    assert_eq!(summary.text(), "We offer X and Y.");
    assert!(!summary.hit_step_limit());
}

#[tokio::test]
async fn tool_result_is_fed_back_before_the_next_round() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_round("call_1", "search_site", &["{\"query\":", "\"services\"}"]),
        text_round(&["We offer X and Y."], FinishReason::Stop),
    ]));
    let resolver = Arc::new(
        MapResolver::default().with("search_site", Ok(json!({"hits": ["X", "Y"]}))),
    );
    let (fin, counters) = finalizer();

    let items = collect(
        Orchestrator::new(model.clone(), vec![search_tool()]).run_stream_owned(
            vec![ChatMessage::user("What services do you offer?")],
            resolver.clone(),
            fin,
        ),
    )
    .await;
    let events = ok_events(&items);

    assert_eq!(
        resolver.calls.lock().unwrap().clone(),
        vec![("search_site".to_string(), json!({"query": "services"}))]
    );

    let call_pos = events
        .iter()
        .position(|e| matches!(e, GenerationEvent::ToolCall { .. }))
        .unwrap();
    assert_eq!(
        events[call_pos + 1],
        GenerationEvent::ToolResult {
            tool_call_id: "call_1".into(),
            tool_name: "search_site".into(),
            output: json!({"hits": ["X", "Y"]}),
            is_error: false,
        }
    );

    let calls = model.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    let second = &calls[1];
    assert_eq!(second.len(), 3);
    assert_eq!(second[1].role, MessageRole::Assistant);
    assert_eq!(second[2].role, MessageRole::Tool);

    assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
    let summary = counters.summary.lock().unwrap().clone().unwrap();
    assert_eq!(summary.steps.len(), 2);
    assert_eq!(summary.usage, Usage::new(18, 7));
}

#[tokio::test]
async fn step_ceiling_cuts_off_an_endless_tool_loop() {
    let model = Arc::new(ScriptedModel::new(vec![tool_round(
        "call_x",
        "search_site",
        &["{}"],
    )]));
    let resolver = Arc::new(MapResolver::default().with("search_site", Ok(json!([]))));
    let (fin, counters) = finalizer();

    let items = collect(
        Orchestrator::new(model.clone(), vec![search_tool()])
            .max_steps(6)
            .run_stream_owned(vec![ChatMessage::user("loop")], resolver, fin),
    )
    .await;

    assert_eq!(model.calls.lock().unwrap().len(), 6);
    assert!(items.iter().all(|i| i.is_ok()));
    let events = ok_events(&items);
    let step_starts = events
        .iter()
        .filter(|e| matches!(e, GenerationEvent::StepStart { .. }))
        .count();
    assert_eq!(step_starts, 6);
    assert_eq!(
        events.last(),
        Some(&GenerationEvent::Finish {
            finish_reason: FinishReason::StepLimit,
            steps: 6,
            usage: Usage::new(48, 12),
        })
    );
    assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
    assert_eq!(counters.failed.load(Ordering::SeqCst), 0);
    assert!(counters.summary.lock().unwrap().as_ref().unwrap().hit_step_limit());
}

#[tokio::test]
async fn zero_max_steps_runs_one_round() {
    let model = Arc::new(ScriptedModel::new(vec![tool_round(
        "c",
        "search_site",
        &["{}"],
    )]));
    let resolver = Arc::new(MapResolver::default().with("search_site", Ok(json!({}))));
    let (fin, _counters) = finalizer();

    let _ = collect(
        Orchestrator::new(model.clone(), vec![search_tool()])
            .max_steps(0)
            .run_stream_owned(vec![ChatMessage::user("hi")], resolver, fin),
    )
    .await;

    assert_eq!(model.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model_and_the_loop_continues() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_round("c1", "does_not_exist", &["{}"]),
        text_round(&["Sorry, I could not look that up."], FinishReason::Stop),
    ]));
    let (fin, counters) = finalizer();

    let items = collect(
        Orchestrator::new(model.clone(), vec![search_tool()]).run_stream_owned(
            vec![ChatMessage::user("hi")],
            Arc::new(MapResolver::default()),
            fin,
        ),
    )
    .await;
    let events = ok_events(&items);

    let result = events
        .iter()
        .find_map(|e| match e {
            GenerationEvent::ToolResult {
                output, is_error, ..
            } => Some((output.clone(), *is_error)),
            _ => None,
        })
        .unwrap();
    assert!(result.1);
    assert_eq!(result.0["error"], "unknown_tool");

    assert_eq!(model.calls.lock().unwrap().len(), 2);
    assert!(events.last().unwrap().is_finish());
    assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn closed_transport_is_fatal() {
    let model = Arc::new(ScriptedModel::new(vec![tool_round(
        "c1",
        "search_site",
        &["{}"],
    )]));
    let resolver = Arc::new(
        MapResolver::default().with("search_site", Err(ToolInvocationError::TransportClosed)),
    );
    let (fin, counters) = finalizer();

    let items = collect(
        Orchestrator::new(model.clone(), vec![search_tool()]).run_stream_owned(
            vec![ChatMessage::user("hi")],
            resolver,
            fin,
        ),
    )
    .await;

    assert!(matches!(
        items.last(),
        Some(Err(GatewayError::ToolInvocation(
            ToolInvocationError::TransportClosed
        )))
    ));
    assert_eq!(model.calls.lock().unwrap().len(), 1);
    assert_eq!(counters.finished.load(Ordering::SeqCst), 0);
    assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn provider_error_fires_on_error_exactly_once() {
    let model = Arc::new(ScriptedModel::new(vec![Script::Fail(
        GatewayError::api_error(500, "boom"),
    )]));
    let (fin, counters) = finalizer();

    let items = collect(Orchestrator::new(model, vec![]).run_stream_owned(
        vec![ChatMessage::user("hi")],
        Arc::new(MapResolver::default()),
        fin,
    ))
    .await;

    assert_eq!(items.len(), 3);
    assert!(matches!(
        items[2],
        Err(GatewayError::ApiError { code: 500, .. })
    ));
    assert_eq!(counters.finished.load(Ordering::SeqCst), 0);
    assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mid_stream_error_keeps_earlier_text() {
    let model = Arc::new(ScriptedModel::new(vec![Script::Events(vec![
        Ok(ChatStreamEvent::ContentDelta {
            delta: "Partial".into(),
            index: Some(0),
        }),
        Err(GatewayError::StreamError("connection reset".into())),
    ])]));
    let (fin, counters) = finalizer();

    let items = collect(Orchestrator::new(model, vec![]).run_stream_owned(
        vec![ChatMessage::user("hi")],
        Arc::new(MapResolver::default()),
        fin,
    ))
    .await;

    assert!(items.iter().any(|i| matches!(
        i,
        Ok(GenerationEvent::TextDelta { delta }) if delta == "Partial"
    )));
    assert!(matches!(items.last(), Some(Err(GatewayError::StreamError(_)))));
    assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_round_times_out() {
    let model = Arc::new(ScriptedModel::new(vec![Script::Hang]));
    let (fin, counters) = finalizer();

    let items = collect(
        Orchestrator::new(model, vec![])
            .step_timeout(Duration::from_millis(50))
            .run_stream_owned(
                vec![ChatMessage::user("hi")],
                Arc::new(MapResolver::default()),
                fin,
            ),
    )
    .await;

    assert!(matches!(items.last(), Some(Err(GatewayError::TimeoutError(_)))));
    assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_tool_is_reported_as_timeout() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_round("c1", "search_site", &["{}"]),
        text_round(&["done"], FinishReason::Stop),
    ]));
    let resolver = Arc::new(MapResolver {
        delay: Some(Duration::from_secs(5)),
        ..MapResolver::default().with("search_site", Ok(json!({})))
    });
    let (fin, counters) = finalizer();

    let items = collect(
        Orchestrator::new(model, vec![search_tool()])
            .tool_timeout(Duration::from_millis(20))
            .run_stream_owned(vec![ChatMessage::user("hi")], resolver, fin),
    )
    .await;
    let events = ok_events(&items);

    assert!(events.iter().any(|e| matches!(
        e,
        GenerationEvent::ToolResult { output, is_error: true, .. } if output["error"] == "timeout"
    )));
    assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropping_the_stream_cancels_and_fires_on_error() {
    let model = Arc::new(ScriptedModel::new(vec![Script::Hang]));
    let (fin, counters) = finalizer();

    let mut stream = Orchestrator::new(model, vec![]).run_stream_owned(
        vec![ChatMessage::user("hi")],
        Arc::new(MapResolver::default()),
        fin,
    );
    assert!(matches!(
        stream.next().await,
        Some(Ok(GenerationEvent::Start { .. }))
    ));
    drop(stream);

    for _ in 0..100 {
        if counters.failed.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.finished.load(Ordering::SeqCst), 0);
    assert!(matches!(
        counters.error.lock().unwrap().as_ref(),
        Some(GatewayError::Cancelled(_))
    ));
}

#[tokio::test]
async fn system_prompt_is_prepended() {
    let model = Arc::new(ScriptedModel::new(vec![text_round(
        &["ok"],
        FinishReason::Stop,
    )]));
    let (fin, _counters) = finalizer();

    let _ = collect(
        Orchestrator::new(model.clone(), vec![])
            .system_prompt("Be brief.")
            .run_stream_owned(
                vec![ChatMessage::user("hi")],
                Arc::new(MapResolver::default()),
                fin,
            ),
    )
    .await;

    let calls = model.calls.lock().unwrap();
    assert_eq!(calls[0][0], ChatMessage::system("Be brief."));
    assert_eq!(calls[0][1], ChatMessage::user("hi"));
}
