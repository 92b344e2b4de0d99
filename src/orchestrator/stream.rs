//! The streaming run loop.

use std::collections::{HashMap, hash_map::Entry};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::Instrument;

use super::Orchestrator;
use super::types::{GenerationSummary, StepResult, ToolExecutionResult};
use crate::error::{GatewayError, ToolInvocationError};
use crate::streaming::{GenerationStream, StreamFinalizer};
use crate::traits::{ChatCapability, ToolResolver};
use crate::types::{
    ChatMessage, ChatStreamEvent, FinishReason, GenerationEvent, ToolCall, ToolDefinition, Usage,
};

type Item = Result<GenerationEvent, GatewayError>;

/// Receiver side of the run loop, exposed as a `Stream`.
struct MpscStream(mpsc::Receiver<Item>);

impl futures::Stream for MpscStream {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_recv(cx)
    }
}

/// Why the loop stopped without a summary.
enum Stop {
    /// The receiver is gone.
    Cancelled,
    /// Fatal error; sent to the caller as the terminal item.
    Failed(GatewayError),
}

#[derive(Debug, Default)]
struct ToolCallAcc {
    tool_name: Option<String>,
    args_json: String,
}

/// What one provider round produced.
struct Round {
    text: String,
    tool_calls: Vec<ToolCall>,
    finish_reason: FinishReason,
    usage: Option<Usage>,
}

pub(super) fn spawn_generation(
    orchestrator: Orchestrator,
    messages: Vec<ChatMessage>,
    resolver: Arc<dyn ToolResolver>,
    finalizer: StreamFinalizer,
) -> GenerationStream {
    let (tx, rx) = mpsc::channel::<Item>(64);

    let task = async move {
        // The sender lives until the finalizer is done, so the stream ends
        // only after cleanup.
        let sender = tx;
        match run_loop(orchestrator, messages, resolver.as_ref(), &sender).await {
            Ok(summary) => {
                let finish = GenerationEvent::Finish {
                    finish_reason: summary.finish_reason,
                    steps: summary.steps.len(),
                    usage: summary.usage,
                };
                if sender.send(Ok(finish)).await.is_err() {
                    tracing::debug!("receiver dropped before the finish event");
                }
                finalizer.finish(summary).await;
            }
            Err(Stop::Failed(error)) => {
                tracing::debug!("generation stopped on error: {}", error);
                let _ = sender.send(Err(error.clone())).await;
                finalizer.fail(error).await;
            }
            Err(Stop::Cancelled) => {
                tracing::info!("caller went away, generation stopped");
                finalizer
                    .fail(GatewayError::Cancelled("caller disconnected".to_string()))
                    .await;
            }
        }
    }
    .instrument(tracing::Span::current());
    tokio::spawn(task);

    Box::pin(MpscStream(rx))
}

async fn run_loop(
    orchestrator: Orchestrator,
    messages: Vec<ChatMessage>,
    resolver: &dyn ToolResolver,
    tx: &mpsc::Sender<Item>,
) -> Result<GenerationSummary, Stop> {
    let Orchestrator {
        model,
        tools,
        options,
    } = orchestrator;
    let max_steps = options.effective_max_steps();

    let mut history = Vec::with_capacity(messages.len() + 1);
    if let Some(prompt) = &options.system_prompt {
        history.push(ChatMessage::system(prompt.clone()));
    }
    history.extend(messages);

    let tool_defs = if tools.is_empty() { None } else { Some(tools) };
    let mut summary = GenerationSummary {
        message_id: format!("msg-{}", uuid::Uuid::new_v4()),
        ..Default::default()
    };

    emit(
        tx,
        GenerationEvent::Start {
            message_id: summary.message_id.clone(),
        },
    )
    .await?;

    for step in 1..=max_steps {
        emit(tx, GenerationEvent::StepStart { step }).await?;
        tracing::debug!(step, max_steps, "model round");

        let round = run_round(
            model.as_ref(),
            &history,
            tool_defs.clone(),
            options.step_timeout,
            tx,
        )
        .await?;

        history.push(ChatMessage::assistant_with_tool_calls(
            round.text.clone(),
            &round.tool_calls,
        ));

        let mut tool_results = Vec::with_capacity(round.tool_calls.len());
        for call in &round.tool_calls {
            emit(
                tx,
                GenerationEvent::ToolCall {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    input: call.arguments.clone(),
                },
            )
            .await?;

            let result = invoke_tool(resolver, call, options.tool_timeout, tx).await?;

            emit(
                tx,
                GenerationEvent::ToolResult {
                    tool_call_id: result.tool_call_id.clone(),
                    tool_name: result.tool_name.clone(),
                    output: result.output.clone(),
                    is_error: result.is_error,
                },
            )
            .await?;
            history.push(ChatMessage::tool_result(
                result.tool_call_id.clone(),
                result.tool_name.clone(),
                result.output.clone(),
                result.is_error,
            ));
            tool_results.push(result);
        }

        emit(
            tx,
            GenerationEvent::StepFinish {
                step,
                finish_reason: round.finish_reason,
                usage: round.usage,
            },
        )
        .await?;

        if let Some(usage) = &round.usage {
            summary.usage.merge(usage);
        }
        let wants_tools = !round.tool_calls.is_empty();
        summary.steps.push(StepResult {
            step,
            text: round.text,
            tool_calls: round.tool_calls,
            tool_results,
            finish_reason: round.finish_reason,
            usage: round.usage,
        });

        if !wants_tools {
            summary.finish_reason = round.finish_reason;
            return Ok(summary);
        }
    }

    tracing::info!(max_steps, "step limit reached, stopping generation");
    summary.finish_reason = FinishReason::StepLimit;
    Ok(summary)
}

async fn run_round(
    model: &dyn ChatCapability,
    history: &[ChatMessage],
    tools: Option<Vec<ToolDefinition>>,
    step_timeout: Duration,
    tx: &mpsc::Sender<Item>,
) -> Result<Round, Stop> {
    let deadline = Instant::now() + step_timeout;
    let timed_out = || {
        Stop::Failed(GatewayError::TimeoutError(format!(
            "model round exceeded {}ms",
            step_timeout.as_millis()
        )))
    };

    let mut upstream = match or_closed(
        tx,
        timeout_at(deadline, model.chat_stream(history.to_vec(), tools)),
    )
    .await?
    {
        Err(_) => return Err(timed_out()),
        Ok(Err(e)) => return Err(Stop::Failed(e)),
        Ok(Ok(stream)) => stream,
    };

    let mut text = String::new();
    let mut acc: HashMap<String, ToolCallAcc> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut last_usage: Option<Usage> = None;
    let mut end = None;

    loop {
        let item = match or_closed(tx, timeout_at(deadline, upstream.next())).await? {
            Err(_) => return Err(timed_out()),
            Ok(None) => break,
            Ok(Some(item)) => item,
        };

        match item.map_err(Stop::Failed)? {
            ChatStreamEvent::ContentDelta { delta, .. } => {
                if delta.is_empty() {
                    continue;
                }
                text.push_str(&delta);
                emit(tx, GenerationEvent::TextDelta { delta }).await?;
            }
            ChatStreamEvent::ToolCallDelta {
                id,
                function_name,
                arguments_delta,
                ..
            } => {
                let entry = match acc.entry(id) {
                    Entry::Vacant(v) => {
                        order.push(v.key().clone());
                        v.insert(ToolCallAcc::default())
                    }
                    Entry::Occupied(o) => o.into_mut(),
                };
                if let Some(name) = function_name.filter(|n| !n.trim().is_empty()) {
                    entry.tool_name = Some(name);
                }
                if let Some(delta) = arguments_delta {
                    entry.args_json.push_str(&delta);
                }
            }
            ChatStreamEvent::UsageUpdate { usage } => last_usage = Some(usage),
            ChatStreamEvent::StreamEnd { response } => end = Some(response),
            ChatStreamEvent::StreamStart { .. } => {}
        }
    }

    let mut tool_calls = tool_calls_ordered(acc, order);
    let (finish_reason, usage) = match end {
        Some(response) => {
            if tool_calls.is_empty() && !response.tool_calls.is_empty() {
                tool_calls = response.tool_calls;
            }
            (response.finish_reason, response.usage.or(last_usage))
        }
        None => (None, last_usage),
    };
    let finish_reason = finish_reason.unwrap_or(if tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    });

    Ok(Round {
        text,
        tool_calls,
        finish_reason,
        usage,
    })
}

async fn invoke_tool(
    resolver: &dyn ToolResolver,
    call: &ToolCall,
    tool_timeout: Duration,
    tx: &mpsc::Sender<Item>,
) -> Result<ToolExecutionResult, Stop> {
    let outcome = match or_closed(
        tx,
        timeout(
            tool_timeout,
            resolver.call_tool(&call.name, call.arguments.clone()),
        ),
    )
    .await?
    {
        Ok(result) => result,
        Err(_) => Err(ToolInvocationError::Timeout {
            tool: call.name.clone(),
            seconds: tool_timeout.as_secs(),
        }),
    };

    let (output, is_error) = match outcome {
        Ok(value) => (value, false),
        Err(e) if e.is_fatal() => {
            return Err(Stop::Failed(GatewayError::ToolInvocation(e)));
        }
        Err(e) => {
            tracing::debug!(tool = %call.name, "tool call failed: {}", e);
            (e.to_tool_output(), true)
        }
    };

    Ok(ToolExecutionResult {
        tool_call_id: call.id.clone(),
        tool_name: call.name.clone(),
        output,
        is_error,
    })
}

fn tool_calls_ordered(mut acc: HashMap<String, ToolCallAcc>, order: Vec<String>) -> Vec<ToolCall> {
    order
        .into_iter()
        .filter_map(|id| {
            let item = acc.remove(&id)?;
            let Some(name) = item.tool_name else {
                tracing::warn!(tool_call_id = %id, "dropping tool call without a name");
                return None;
            };
            Some(ToolCall::from_raw(id, name, &item.args_json))
        })
        .collect()
}

async fn emit(tx: &mpsc::Sender<Item>, event: GenerationEvent) -> Result<(), Stop> {
    tx.send(Ok(event)).await.map_err(|_| Stop::Cancelled)
}

/// Await `fut` unless the receiver goes away first.
async fn or_closed<F: Future>(tx: &mpsc::Sender<Item>, fut: F) -> Result<F::Output, Stop> {
    tokio::select! {
        biased;
        _ = tx.closed() => Err(Stop::Cancelled),
        out = fut => Ok(out),
    }
}
