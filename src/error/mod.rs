//! Error Handling Module
//!
//! Error taxonomy for the gateway:
//! - `GatewayError`: request-level errors (malformed input, connection, provider, cleanup)
//! - `ToolInvocationError`: per-call tool failures that are fed back to the model
//! - `ErrorCategory`: coarse classification used for logging and HTTP mapping
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_chat_gateway::error::{ErrorCategory, GatewayError};
//!
//! let error = GatewayError::api_error(429, "rate limited");
//! assert_eq!(error.category(), ErrorCategory::Provider);
//! assert!(error.is_fatal());
//! ```

mod conversions;
pub mod types;

pub use types::*;
