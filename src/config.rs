//! Process configuration.
//!
//! Every option can come from a flag or the environment. Values are read once
//! at startup and shared read-only afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{GatewayError, Result};
use crate::orchestrator::{DEFAULT_MAX_STEPS, OrchestratorOptions};
use crate::providers::openai::OpenAiConfig;
use crate::providers::openai::config::{DEFAULT_BASE_URL, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MODEL};
use crate::streaming::UiStreamOptions;

/// Assistant instructions used when no prompt file is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant for a content website. Use your knowledge base tools to search for relevant information before answering questions.

Guidelines:
- ALWAYS use tools to search for information. Never rely on pre-trained knowledge.
- If no relevant information is found after searching, respond with \"Sorry, I couldn't find information about that in the website.\"
- Be concise and direct in your responses.

Formatting rules:
- Never use markdown headings (#, ##, ###) or underline-style headings (=== or ---).
- Use **bold text** for emphasis and section labels instead.
- Start all responses with content, never with a heading.

- If a question is ambiguous, ask for clarification rather than guessing.
- When multiple relevant items are found, list them clearly using bullet points.
- You have several tool calls available, so be strategic: start broad, then get specific if needed.
- Format responses in a conversational way, not as documentation sections.";

/// Command line and environment options.
#[derive(Parser, Clone)]
#[command(version, about = "Streaming chat endpoint backed by MCP tools")]
pub struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "GATEWAY_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// API key for the LLM provider.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Base URL of the OpenAI-compatible API (or an AI gateway in front of it).
    #[arg(long, env = "AI_GATEWAY_URL", default_value = DEFAULT_BASE_URL)]
    pub ai_gateway_url: String,

    /// Gateway token, sent as `cf-aig-authorization: Bearer <token>`.
    #[arg(long, env = "AI_GATEWAY_TOKEN", hide_env_values = true)]
    pub ai_gateway_token: Option<String>,

    /// Streamable HTTP endpoint of the MCP tool service.
    #[arg(long, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Model identifier.
    #[arg(long, env = "GATEWAY_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Maximum generation steps per request.
    #[arg(long, env = "GATEWAY_MAX_STEPS", default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,

    /// Output token budget per step.
    #[arg(long, env = "GATEWAY_MAX_OUTPUT_TOKENS", default_value_t = DEFAULT_MAX_OUTPUT_TOKENS)]
    pub max_output_tokens: u32,

    /// Deadline for one generation round, in seconds.
    #[arg(long, env = "GATEWAY_STEP_TIMEOUT_SECS", default_value_t = 120)]
    pub step_timeout_secs: u64,

    /// Deadline for one tool call, in seconds.
    #[arg(long, env = "GATEWAY_TOOL_TIMEOUT_SECS", default_value_t = 30)]
    pub tool_timeout_secs: u64,

    /// File holding the system prompt. The built-in prompt is used otherwise.
    #[arg(long, env = "GATEWAY_SYSTEM_PROMPT_FILE")]
    pub system_prompt_file: Option<PathBuf>,

    /// Send raw error text to clients instead of masked messages.
    #[arg(long, env = "GATEWAY_EXPOSE_ERRORS", default_value_t = false)]
    pub expose_errors: bool,
}

impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("bind", &self.bind)
            .field("openai_api_key", &"[REDACTED]")
            .field("ai_gateway_url", &self.ai_gateway_url)
            .field(
                "ai_gateway_token",
                &self.ai_gateway_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("mcp_endpoint", &self.mcp_endpoint)
            .field("model", &self.model)
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

/// Validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: SocketAddr,
    pub mcp_endpoint: String,
    pub provider: OpenAiConfig,
    pub orchestrator: OrchestratorOptions,
    pub ui: UiStreamOptions,
}

impl Settings {
    /// Validate the options and load the system prompt.
    ///
    /// Only presence is checked; reachability shows up per request.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let system_prompt = match &cli.system_prompt_file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                GatewayError::ConfigurationError(format!(
                    "cannot read system prompt {}: {e}",
                    path.display()
                ))
            })?,
            None => DEFAULT_SYSTEM_PROMPT.to_string(),
        };
        Self::build(cli, system_prompt)
    }

    fn build(cli: Cli, system_prompt: String) -> Result<Self> {
        let api_key = required("OPENAI_API_KEY", cli.openai_api_key)?;
        let mcp_endpoint = required("MCP_ENDPOINT", cli.mcp_endpoint)?;

        let mut provider = OpenAiConfig::new(SecretString::from(api_key))
            .with_base_url(cli.ai_gateway_url)
            .with_model(cli.model)
            .with_max_output_tokens(Some(cli.max_output_tokens));
        if let Some(token) = cli.ai_gateway_token.filter(|t| !t.trim().is_empty()) {
            provider = provider.with_gateway_token(SecretString::from(token));
        }
        provider.validate()?;

        let step_timeout = positive_secs("GATEWAY_STEP_TIMEOUT_SECS", cli.step_timeout_secs)?;
        let tool_timeout = positive_secs("GATEWAY_TOOL_TIMEOUT_SECS", cli.tool_timeout_secs)?;

        let system_prompt = system_prompt.trim();
        let orchestrator = OrchestratorOptions {
            max_steps: cli.max_steps,
            step_timeout,
            tool_timeout,
            system_prompt: (!system_prompt.is_empty()).then(|| system_prompt.to_string()),
        };

        let ui = if cli.expose_errors {
            UiStreamOptions::development()
        } else {
            UiStreamOptions::production()
        };

        Ok(Self {
            bind: cli.bind,
            mcp_endpoint,
            provider,
            orchestrator,
            ui,
        })
    }

    /// Whether an AI gateway token will be sent.
    pub fn has_gateway_token(&self) -> bool {
        self.provider
            .gateway_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }
}

fn required(name: &str, value: String) -> Result<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(GatewayError::ConfigurationError(format!(
            "{name} must not be empty"
        )));
    }
    Ok(value)
}

fn positive_secs(name: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(GatewayError::ConfigurationError(format!(
            "{name} must be greater than zero"
        )));
    }
    Ok(Duration::from_secs(secs))
}
