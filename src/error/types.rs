//! Core error types.

use thiserror::Error;

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The caller sent something we cannot process.
    Client,
    /// The tool service could not be reached or negotiation failed.
    Connection,
    /// A single tool call failed.
    Tool,
    /// The LLM provider failed.
    Provider,
    /// Releasing a resource failed.
    Cleanup,
    /// The request was abandoned before completion.
    Cancelled,
    /// Invalid process configuration.
    Configuration,
}

/// Errors surfaced by the request pipeline.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Inbound payload failed shape validation.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Tool service unreachable or MCP negotiation failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A tool invocation failed in a way that leaves the session unusable.
    #[error("Tool invocation error: {0}")]
    ToolInvocation(#[from] ToolInvocationError),

    /// Provider returned a non-success HTTP status.
    #[error("API error {code}: {message}")]
    ApiError {
        /// HTTP status code
        code: u16,
        /// Error message reported by the provider
        message: String,
    },

    /// Provider request could not be sent or was rejected.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Provider stream broke mid-generation.
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Provider payload could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A generation round exceeded its deadline.
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Closing the tool session failed.
    #[error("Cleanup error: {0}")]
    CleanupError(String),

    /// The caller went away or the request task was torn down.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl GatewayError {
    /// Create an API error from a status code and message.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
        }
    }

    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedRequest(_) => ErrorCategory::Client,
            Self::ConnectionError(_) => ErrorCategory::Connection,
            Self::ToolInvocation(_) => ErrorCategory::Tool,
            Self::ApiError { .. }
            | Self::ProviderError(_)
            | Self::StreamError(_)
            | Self::ParseError(_)
            | Self::TimeoutError(_) => ErrorCategory::Provider,
            Self::CleanupError(_) => ErrorCategory::Cleanup,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether the error terminates the request stream.
    ///
    /// Cleanup errors are only ever logged; everything else that reaches the
    /// pipeline as a `GatewayError` ends the request.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CleanupError(_))
    }

    /// HTTP status used when the error is returned before streaming starts.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedRequest(_) => 400,
            Self::ConnectionError(_) | Self::ToolInvocation(_) => 502,
            Self::ApiError { code, .. } if *code == 429 => 429,
            Self::ApiError { .. }
            | Self::ProviderError(_)
            | Self::StreamError(_)
            | Self::ParseError(_) => 502,
            Self::TimeoutError(_) => 504,
            Self::Cancelled(_) => 499,
            Self::CleanupError(_) | Self::ConfigurationError(_) => 500,
        }
    }

    /// Stable machine-readable kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "malformed_request",
            Self::ConnectionError(_) => "connection_error",
            Self::ToolInvocation(_) => "tool_invocation_error",
            Self::ApiError { .. } => "api_error",
            Self::ProviderError(_) => "provider_error",
            Self::StreamError(_) => "stream_error",
            Self::ParseError(_) => "parse_error",
            Self::TimeoutError(_) => "timeout_error",
            Self::CleanupError(_) => "cleanup_error",
            Self::Cancelled(_) => "cancelled",
            Self::ConfigurationError(_) => "configuration_error",
        }
    }

    /// Message safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::MalformedRequest(msg) => format!("Invalid request: {msg}"),
            Self::ConnectionError(_) => "The tool service is currently unavailable.".to_string(),
            Self::ToolInvocation(e) => format!("Tool call failed: {e}"),
            Self::ApiError { code: 429, .. } => {
                "The model is rate limited, please retry later.".to_string()
            }
            Self::ApiError { code, .. } => format!("The model provider returned HTTP {code}."),
            Self::TimeoutError(_) => "The model took too long to respond.".to_string(),
            Self::Cancelled(_) => "The request was cancelled.".to_string(),
            _ => "An error occurred while generating the answer.".to_string(),
        }
    }
}

/// Failure of one tool call.
///
/// These are recoverable by default: the orchestrator turns them into a tool
/// result the model can read. Only `TransportClosed` and `SessionClosed`
/// mean the session can no longer serve calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocationError {
    /// The model asked for a tool the service does not list.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments are not an object or do not match the input schema.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// Tool name
        tool: String,
        /// Validation failure
        reason: String,
    },

    /// The remote tool ran and reported a failure.
    #[error("{tool} failed: {message}")]
    Execution {
        /// Tool name
        tool: String,
        /// Remote error text
        message: String,
    },

    /// The request could not be delivered.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport is gone; no further calls can succeed.
    #[error("transport closed")]
    TransportClosed,

    /// The call did not complete in time.
    #[error("{tool} timed out after {seconds}s")]
    Timeout {
        /// Tool name
        tool: String,
        /// Elapsed limit in seconds
        seconds: u64,
    },

    /// The owning session was already closed.
    #[error("tool session is closed")]
    SessionClosed,
}

impl ToolInvocationError {
    /// Stable kind reported back to the model.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_args",
            Self::Execution { .. } => "tool_error",
            Self::Transport(_) => "transport_error",
            Self::TransportClosed => "transport_closed",
            Self::Timeout { .. } => "timeout",
            Self::SessionClosed => "session_closed",
        }
    }

    /// Whether the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportClosed | Self::SessionClosed)
    }

    /// JSON payload fed back into the conversation as the tool result.
    pub fn to_tool_output(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        })
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;
