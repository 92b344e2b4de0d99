//! Request handler: `POST /api/search`.
//!
//! Construction order per request: open the tool session, list its tools,
//! start the orchestrator, wrap its output for the UI, and return the
//! streaming response right away. The session is closed by whichever
//! terminal hook fires.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tracing::Instrument;

use super::payload::parse_search_request;
use super::sse::to_ui_message_sse_response;
use crate::mcp::{McpConnector, ToolSession};
use crate::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::streaming::{
    StreamFinalizer, UiChunkStream, UiStreamOptions, encode_ui_message_stream,
    error_ui_message_stream,
};
use crate::traits::ChatCapability;
use crate::types::ChatMessage;

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct AppState {
    /// LLM provider
    pub model: Arc<dyn ChatCapability>,
    /// Opens one tool session per request
    pub connector: Arc<dyn McpConnector>,
    /// Tool service endpoint
    pub mcp_endpoint: Arc<str>,
    /// Orchestrator limits and prompt
    pub orchestrator: OrchestratorOptions,
    /// Outbound stream options
    pub ui: UiStreamOptions,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("provider", &self.model.provider_id())
            .field("mcp_endpoint", &self.mcp_endpoint)
            .field("orchestrator", &self.orchestrator)
            .field("ui", &self.ui)
            .finish()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn search(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("search", %request_id);

    async move {
        let messages = match parse_search_request(&body) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("rejected request: {}", e);
                return e.into_response();
            }
        };
        tracing::info!(messages = messages.len(), "search request");
        to_ui_message_sse_response(start_generation(&state, messages).await)
    }
    .instrument(span)
    .await
}

/// Open the tool session and start generating.
///
/// Connection and listing failures come back as a single-error stream; no
/// generation step runs in that case.
pub async fn start_generation(state: &AppState, messages: Vec<ChatMessage>) -> UiChunkStream {
    let session = match ToolSession::open(state.connector.as_ref(), &state.mcp_endpoint).await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            tracing::error!("failed to connect to tool service: {}", e);
            return error_ui_message_stream(&e, state.ui.clone());
        }
    };

    let tools = match session.tool_definitions().await {
        Ok(tools) => tools,
        Err(e) => {
            tracing::error!("failed to list tools: {}", e);
            session.close_logged().await;
            return error_ui_message_stream(&e, state.ui.clone());
        }
    };
    tracing::debug!(tools = tools.len(), "tool session ready");

    let on_finish_session = session.clone();
    let on_error_session = session.clone();
    let finalizer = StreamFinalizer::new()
        .on_finish(move |summary| async move {
            tracing::info!(
                steps = summary.steps.len(),
                finish_reason = summary.finish_reason.as_str(),
                total_tokens = summary.usage.total_tokens,
                "generation finished"
            );
            on_finish_session.close_logged().await;
        })
        .on_error(move |error| async move {
            tracing::error!("generation failed: {}", error);
            on_error_session.close_logged().await;
        });

    let stream = Orchestrator::new(state.model.clone(), tools)
        .with_options(state.orchestrator.clone())
        .run_stream_owned(messages, session, finalizer);

    encode_ui_message_stream(stream, state.ui.clone())
}
