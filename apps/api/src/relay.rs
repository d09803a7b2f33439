//! Streaming relay — forwards model output to the browser as Server-Sent Events.
//!
//! Every content event is `data: {"content": "..."}`. What `content` holds
//! depends on the [`RelayMode`]. The stream ends with an `event: done` frame,
//! or a single `event: error` frame if the upstream fails. There is no retry
//! and no reordering: chunks go out in arrival order.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm_client::LlmError;
use crate::markdown::render_markdown;

/// Data sent with the terminating `done` event.
pub const DONE_SENTINEL: &str = "[DONE]";

/// What each relayed event carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Only the newly received chunk.
    Delta,
    /// The whole text received so far.
    Accumulated,
    /// The text so far, re-rendered from markdown to HTML on every chunk.
    #[default]
    Markdown,
}

#[derive(Debug, Serialize)]
struct ContentFrame<'a> {
    content: &'a str,
}

/// Accumulates chunks and produces the payload for each event.
#[derive(Debug)]
pub struct Relay {
    mode: RelayMode,
    text: String,
}

impl Relay {
    pub fn new(mode: RelayMode) -> Self {
        Self {
            mode,
            text: String::new(),
        }
    }

    /// Appends a chunk and returns the payload to send, or `None` for empty chunks.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        if chunk.is_empty() {
            return None;
        }
        self.text.push_str(chunk);
        Some(match self.mode {
            RelayMode::Delta => chunk.to_string(),
            RelayMode::Accumulated => self.text.clone(),
            RelayMode::Markdown => render_markdown(&self.text),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

fn content_event(payload: &str) -> Event {
    let data = serde_json::to_string(&ContentFrame { content: payload })
        .unwrap_or_else(|_| String::from("{\"content\":\"\"}"));
    Event::default().data(data)
}

fn done_event() -> Event {
    Event::default().event("done").data(DONE_SENTINEL)
}

fn error_event(message: &str) -> Event {
    // SSE cannot carry carriage returns; newlines become extra data lines.
    Event::default().event("error").data(message.replace('\r', ""))
}

fn frame(event: Event) -> Result<Event, Infallible> {
    Ok(event)
}

struct RelayState {
    upstream: BoxStream<'static, Result<String, LlmError>>,
    relay: Relay,
    pace: Duration,
}

/// Turns a stream of model chunks into a stream of SSE events.
pub fn relay_events(
    upstream: BoxStream<'static, Result<String, LlmError>>,
    mode: RelayMode,
    pace: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let state = RelayState {
        upstream,
        relay: Relay::new(mode),
        pace,
    };

    stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    if let Some(payload) = state.relay.push(&chunk) {
                        if !state.pace.is_zero() {
                            tokio::time::sleep(state.pace).await;
                        }
                        return Some((frame(content_event(&payload)), Some(state)));
                    }
                }
                Some(Err(e)) => {
                    warn!("Relay upstream failed after {} bytes: {e}", state.relay.text().len());
                    return Some((frame(error_event(&e.to_string())), None));
                }
                None => {
                    debug!("Relay finished: {} bytes relayed", state.relay.text().len());
                    return Some((frame(done_event()), None));
                }
            }
        }
    })
}

/// Wraps [`relay_events`] in an SSE response with keep-alive comments.
pub fn sse_response(
    upstream: BoxStream<'static, Result<String, LlmError>>,
    mode: RelayMode,
    pace: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    Sse::new(relay_events(upstream, mode, pace)).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn upstream(chunks: Vec<Result<&'static str, LlmError>>) -> BoxStream<'static, Result<String, LlmError>> {
        stream::iter(chunks.into_iter().map(|c| c.map(str::to_string))).boxed()
    }

    async fn body_of(chunks: Vec<Result<&'static str, LlmError>>, mode: RelayMode) -> String {
        let response = sse_response(upstream(chunks), mode, Duration::ZERO).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_delta_mode_sends_only_new_chunk() {
        let mut relay = Relay::new(RelayMode::Delta);
        assert_eq!(relay.push("Hel").as_deref(), Some("Hel"));
        assert_eq!(relay.push("lo").as_deref(), Some("lo"));
        assert_eq!(relay.text(), "Hello");
    }

    #[test]
    fn test_accumulated_mode_sends_running_text() {
        let mut relay = Relay::new(RelayMode::Accumulated);
        relay.push("{\"entities\"");
        assert_eq!(relay.push(": []}").as_deref(), Some("{\"entities\": []}"));
    }

    #[test]
    fn test_markdown_mode_rerenders_whole_text() {
        let mut relay = Relay::new(RelayMode::Markdown);
        relay.push("# Ti");
        let html = relay.push("tle\n\n- item").unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<li>item</li>"));
    }

    #[test]
    fn test_empty_chunks_produce_no_payload() {
        let mut relay = Relay::new(RelayMode::Delta);
        assert!(relay.push("").is_none());
    }

    #[test]
    fn test_mode_parses_from_lowercase() {
        let mode: RelayMode = serde_json::from_str("\"accumulated\"").unwrap();
        assert_eq!(mode, RelayMode::Accumulated);
        assert_eq!(RelayMode::default(), RelayMode::Markdown);
    }

    #[tokio::test]
    async fn test_sse_body_has_content_frames_then_done() {
        let body = body_of(vec![Ok("Hel"), Ok(""), Ok("lo")], RelayMode::Delta).await;
        let first = body.find("data: {\"content\":\"Hel\"}").unwrap();
        let second = body.find("data: {\"content\":\"lo\"}").unwrap();
        let done = body.find("event: done").unwrap();
        assert!(first < second && second < done);
        assert!(body.contains("data: [DONE]"));
        assert_eq!(body.matches("data: {").count(), 2);
    }

    #[tokio::test]
    async fn test_sse_body_escapes_content_as_json() {
        let body = body_of(vec![Ok("line \"one\"\nline two")], RelayMode::Delta).await;
        assert!(body.contains(r#"data: {"content":"line \"one\"\nline two"}"#));
    }

    #[tokio::test]
    async fn test_upstream_error_ends_stream_with_error_event() {
        let body = body_of(
            vec![Ok("partial"), Err(LlmError::EmptyContent), Ok("never sent")],
            RelayMode::Accumulated,
        )
        .await;
        assert!(body.contains("data: {\"content\":\"partial\"}"));
        assert!(body.contains("event: error"));
        assert!(!body.contains("never sent"));
        assert!(!body.contains("event: done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_delays_each_content_event() {
        let started = tokio::time::Instant::now();
        let events: Vec<_> = relay_events(
            upstream(vec![Ok("a"), Ok("b"), Ok("c")]),
            RelayMode::Delta,
            Duration::from_millis(50),
        )
        .collect()
        .await;
        assert_eq!(events.len(), 4); // three content frames + done
        assert!(started.elapsed() >= Duration::from_millis(150));
    }
}
