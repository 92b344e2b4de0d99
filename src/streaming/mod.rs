//! Streaming Module
//!
//! Stream types plus the adapter pieces that sit between the orchestrator and
//! the HTTP response:
//! - `StreamFinalizer`: exactly-once terminal hooks (`on_finish` / `on_error`)
//! - `ui_message`: encoding of generation events into UI message stream chunks

pub mod finalizer;
pub mod ui_message;

use futures::Stream;
use std::pin::Pin;

use crate::error::GatewayError;
use crate::types::{ChatStreamEvent, GenerationEvent};

pub use finalizer::StreamFinalizer;
pub use ui_message::{
    UiChunkStream, UiMessageChunk, UiMessageEncoder, UiStreamOptions, encode_ui_message_stream,
    error_ui_message_stream,
};

/// Chat Stream - one provider round.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamEvent, GatewayError>> + Send>>;

/// Generation Stream - the orchestrator output across all rounds.
///
/// Single consumption: once polled to completion it yields nothing further.
pub type GenerationStream =
    Pin<Box<dyn Stream<Item = Result<GenerationEvent, GatewayError>> + Send>>;
