//! Capability traits
//!
//! The orchestrator depends only on these two seams: a streaming chat model and
//! a mapping from tool name to invocation.

mod chat;
mod tool;

pub use chat::ChatCapability;
pub use tool::ToolResolver;
