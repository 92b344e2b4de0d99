//! OpenAI-compatible chat-completions provider.
//!
//! Works against api.openai.com and against gateways that proxy it (for
//! example Cloudflare AI Gateway, via `cf-aig-authorization`).

pub mod client;
pub mod config;
pub mod streaming;
pub mod transformers;

pub use client::OpenAiClient;
pub use config::OpenAiConfig;
