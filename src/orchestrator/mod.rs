//! Bounded multi-step generation with tool calls.
//!
//! The orchestrator drives a generate → tool-call → re-generate loop against a
//! [`ChatCapability`] and exposes it as a single [`GenerationStream`]. Tools
//! are only known by name and schema; execution goes through a
//! [`ToolResolver`].
//!
//! # Example
//!
//! ```rust,ignore
//! let stream = Orchestrator::new(model, tools)
//!     .max_steps(6)
//!     .system_prompt("You are a helpful assistant.")
//!     .run_stream_owned(messages, resolver, StreamFinalizer::new());
//! ```

mod stream;
pub mod types;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

pub use types::{
    DEFAULT_MAX_STEPS, DEFAULT_STEP_TIMEOUT, DEFAULT_TOOL_TIMEOUT, GenerationSummary,
    OrchestratorOptions, StepResult, ToolExecutionResult,
};

use crate::streaming::{GenerationStream, StreamFinalizer};
use crate::traits::{ChatCapability, ToolResolver};
use crate::types::{ChatMessage, ToolDefinition};

/// Orchestrator facade binding a model and a tool set.
pub struct Orchestrator {
    model: Arc<dyn ChatCapability>,
    tools: Vec<ToolDefinition>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Create a new orchestrator with default options.
    pub fn new(model: Arc<dyn ChatCapability>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            model,
            tools,
            options: OrchestratorOptions::default(),
        }
    }

    /// Replace all options at once.
    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the step ceiling.
    pub fn max_steps(mut self, max: usize) -> Self {
        self.options.max_steps = max;
        self
    }

    /// Set the per-round deadline.
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.options.step_timeout = timeout;
        self
    }

    /// Set the per-tool-call deadline.
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.options.tool_timeout = timeout;
        self
    }

    /// Prepend a system prompt to every run.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.system_prompt = Some(prompt.into());
        self
    }

    /// Current options.
    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Tools offered to the model.
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Start the loop in a background task and return its event stream.
    ///
    /// The finalizer fires exactly once: `on_finish` after the `Finish`
    /// event, `on_error` after a fatal error or when the stream is dropped
    /// before the end. Must be called inside a Tokio runtime.
    pub fn run_stream_owned(
        self,
        messages: Vec<ChatMessage>,
        resolver: Arc<dyn ToolResolver>,
        finalizer: StreamFinalizer,
    ) -> GenerationStream {
        stream::spawn_generation(self, messages, resolver, finalizer)
    }
}
