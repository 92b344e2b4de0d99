//! HTTP surface (axum).
//!
//! - `POST /api/search`: tool-augmented streaming completion
//! - `GET /healthz`: liveness

mod error;
pub mod handler;
pub mod payload;
pub mod sse;

pub use handler::{AppState, router, start_generation};
pub use sse::{UI_MESSAGE_STREAM_HEADER, to_ui_message_sse_response};
