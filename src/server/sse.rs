//! SSE framing for the UI message stream.

use std::convert::Infallible;

use axum::http::{HeaderName, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt, stream};

use crate::streaming::{UiChunkStream, UiMessageChunk};

/// Protocol marker header expected by UI message stream clients.
pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

/// End-of-stream sentinel sent after the terminal chunk.
pub const DONE_SENTINEL: &str = "[DONE]";

fn chunk_event(chunk: &UiMessageChunk) -> Event {
    let data = serde_json::to_string(chunk)
        .unwrap_or_else(|_| r#"{"type":"error","errorText":"internal error"}"#.to_string());
    Event::default().data(data)
}

/// Frame chunks as `data:` events followed by `data: [DONE]`.
pub fn to_sse_event_stream(
    chunks: UiChunkStream,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    chunks
        .map(|chunk| Ok(chunk_event(&chunk)))
        .chain(stream::once(async {
            Ok(Event::default().data(DONE_SENTINEL))
        }))
}

/// Convert a UI chunk stream into the streaming HTTP response.
pub fn to_ui_message_sse_response(chunks: UiChunkStream) -> Response {
    let mut response = Sse::new(to_sse_event_stream(chunks))
        .keep_alive(KeepAlive::default())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(UI_MESSAGE_STREAM_HEADER),
        HeaderValue::from_static("v1"),
    );
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn frames_chunks_and_appends_done() {
        let chunks: UiChunkStream = Box::pin(stream::iter(vec![
            UiMessageChunk::StartStep,
            UiMessageChunk::Finish {
                message_metadata: None,
            },
        ]));
        let response = to_ui_message_sse_response(chunks);

        assert_eq!(response.headers()[UI_MESSAGE_STREAM_HEADER], "v1");
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "text/event-stream"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(
            body,
            "data: {\"type\":\"start-step\"}\n\ndata: {\"type\":\"finish\"}\n\ndata: [DONE]\n\n"
        );
    }
}
