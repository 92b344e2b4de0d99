//! Orchestrator option and result types.

use std::time::Duration;

use crate::types::{FinishReason, ToolCall, Usage};

/// Default step ceiling.
pub const DEFAULT_MAX_STEPS: usize = 6;
/// Default wall-clock budget for one model round.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(120);
/// Default budget for one tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Orchestrator options.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Maximum model rounds, including the final answer round. `0` is treated as `1`.
    pub max_steps: usize,
    /// Deadline for one model round (request plus the whole stream).
    pub step_timeout: Duration,
    /// Deadline for one tool invocation.
    pub tool_timeout: Duration,
    /// System prompt prepended to the conversation.
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            system_prompt: None,
        }
    }
}

impl OrchestratorOptions {
    /// Step ceiling with the `0 => 1` rule applied.
    pub fn effective_max_steps(&self) -> usize {
        self.max_steps.max(1)
    }
}

/// Outcome of one tool invocation inside a step.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: serde_json::Value,
    pub is_error: bool,
}

/// Result of a single model round.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// 1-based step number.
    pub step: usize,
    /// Text produced in this round.
    pub text: String,
    /// Tool calls requested by the model, in first-seen order.
    pub tool_calls: Vec<ToolCall>,
    /// Results fed back to the model.
    pub tool_results: Vec<ToolExecutionResult>,
    /// Finish reason reported by the provider for this round.
    pub finish_reason: FinishReason,
    /// Usage reported by the provider for this round.
    pub usage: Option<Usage>,
}

/// Everything a finished generation produced.
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    /// Id of the assistant message.
    pub message_id: String,
    /// Steps in execution order.
    pub steps: Vec<StepResult>,
    /// Why the whole generation ended.
    pub finish_reason: FinishReason,
    /// Usage summed across steps.
    pub usage: Usage,
}

impl Default for GenerationSummary {
    fn default() -> Self {
        Self {
            message_id: String::new(),
            steps: Vec::new(),
            finish_reason: FinishReason::Unknown,
            usage: Usage::default(),
        }
    }
}

impl GenerationSummary {
    /// Concatenated answer text across all steps.
    pub fn text(&self) -> String {
        self.steps.iter().map(|s| s.text.as_str()).collect()
    }

    /// Whether the step ceiling cut the generation off.
    pub fn hit_step_limit(&self) -> bool {
        self.finish_reason == FinishReason::StepLimit
    }
}
