/// LLM Client — the single point of entry for all chat-completion calls in promptdeck.
///
/// ARCHITECTURAL RULE: No other module may call the model API directly.
/// All LLM interactions MUST go through this module.
///
/// Speaks the OpenAI-compatible chat-completions protocol, which covers both the
/// hosted API and a local Ollama server (`/v1/chat/completions`).
use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod prompts;

use prompts::{create_message, ChatMessage};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Connection settings for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl From<&Config> for LlmSettings {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.llm_base_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// One `data:` payload of a streamed completion.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// The single LLM client used by all applications.
/// Wraps the chat-completions API with retry logic, structured output helpers and streaming.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            settings,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// Posts a chat request, retrying on 429, 5xx and transport errors with exponential backoff.
    async fn send_with_retry(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let url = self.completions_url();
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.settings.api_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Makes a non-streaming call, returning the full response object.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = ChatRequest {
            model: &self.settings.model,
            messages: create_message(system, prompt),
            stream: false,
        };

        let response = self.send_with_retry(&request_body).await?;
        let llm_response: LlmResponse = response.json().await?;

        if let Some(usage) = &llm_response.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(llm_response)
    }

    /// Calls the LLM and returns the text of the first choice.
    pub async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let text = self.complete(prompt, system).await?;
        serde_json::from_str(strip_json_fences(&text)).map_err(LlmError::Parse)
    }

    /// Streams the completion as text deltas. Empty deltas are skipped; the stream
    /// ends at `[DONE]` or when the upstream body closes.
    pub async fn stream(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError> {
        let request_body = ChatRequest {
            model: &self.settings.model,
            messages: create_message(system, prompt),
            stream: true,
        };

        let response = self.send_with_retry(&request_body).await?;
        debug!("LLM stream opened (model: {})", self.settings.model);

        let state = DeltaStream {
            body: response.bytes_stream().boxed(),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            finished: false,
        };

        Ok(stream::unfold(state, next_delta).boxed())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Upstream SSE decoding
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum StreamItem {
    Delta(String),
    Done,
}

/// What one chunk of the body decoded to. Items decoded before a bad line are kept.
#[derive(Debug, Default)]
struct Decoded {
    items: Vec<StreamItem>,
    error: Option<LlmError>,
}

/// Splits the upstream byte stream into `data:` lines. Network chunks may end
/// mid-line (or mid-codepoint), so incomplete lines stay buffered.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Decodes every complete line. Stops at the first bad line and drops the rest.
    fn feed(&mut self, chunk: &[u8]) -> Decoded {
        self.buffer.extend_from_slice(chunk);
        let mut decoded = Decoded::default();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            match decode_line(line.trim_end_matches(&['\r', '\n'][..])) {
                Ok(Some(item)) => decoded.items.push(item),
                Ok(None) => {}
                Err(e) => {
                    self.buffer.clear();
                    decoded.error = Some(e);
                    break;
                }
            }
        }
        decoded
    }

    /// Decodes whatever is left once the body has closed.
    fn finish(&mut self) -> Decoded {
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        match decode_line(line.trim()) {
            Ok(item) => Decoded {
                items: item.into_iter().collect(),
                error: None,
            },
            Err(e) => Decoded {
                items: Vec::new(),
                error: Some(e),
            },
        }
    }
}

fn decode_line(line: &str) -> Result<Option<StreamItem>, LlmError> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }
    if payload == "[DONE]" {
        return Ok(Some(StreamItem::Done));
    }

    let chunk: StreamChunk = serde_json::from_str(payload)?;
    if let Some(error) = chunk.error {
        return Err(LlmError::Stream(error.message));
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(StreamItem::Delta(text)))
    }
}

struct DeltaStream {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl DeltaStream {
    fn absorb(&mut self, decoded: Decoded) {
        for item in decoded.items {
            match item {
                StreamItem::Delta(text) => self.pending.push_back(Ok(text)),
                StreamItem::Done => {
                    self.finished = true;
                    return;
                }
            }
        }
        if let Some(e) = decoded.error {
            self.pending.push_back(Err(e));
            self.finished = true;
        }
    }
}

async fn next_delta(
    mut state: DeltaStream,
) -> Option<(Result<String, LlmError>, DeltaStream)> {
    loop {
        if let Some(item) = state.pending.pop_front() {
            return Some((item, state));
        }
        if state.finished {
            return None;
        }
        match state.body.next().await {
            Some(Ok(chunk)) => {
                let decoded = state.decoder.feed(&chunk);
                state.absorb(decoded);
            }
            Some(Err(e)) => {
                state.pending.push_back(Err(LlmError::Http(e)));
                state.finished = true;
            }
            None => {
                let decoded = state.decoder.finish();
                state.absorb(decoded);
                state.finished = true;
            }
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_decoder_yields_deltas_in_order() {
        let mut decoder = SseDecoder::default();
        let body = format!("{}{}data: [DONE]\n\n", delta("Hel"), delta("lo"));
        let items = decoder.feed(body.as_bytes()).items;
        assert_eq!(
            items,
            vec![
                StreamItem::Delta("Hel".to_string()),
                StreamItem::Delta("lo".to_string()),
                StreamItem::Done,
            ]
        );
    }

    #[test]
    fn test_decoder_buffers_lines_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let body = delta("split");
        let (head, tail) = body.as_bytes().split_at(17);
        assert!(decoder.feed(head).items.is_empty());
        assert_eq!(
            decoder.feed(tail).items,
            vec![StreamItem::Delta("split".to_string())]
        );
    }

    #[test]
    fn test_decoder_buffers_split_multibyte_characters() {
        let mut decoder = SseDecoder::default();
        let body = delta("café");
        let bytes = body.as_bytes();
        let split = body.find('é').unwrap() + 1; // inside the two-byte sequence
        assert!(decoder.feed(&bytes[..split]).items.is_empty());
        assert_eq!(
            decoder.feed(&bytes[split..]).items,
            vec![StreamItem::Delta("café".to_string())]
        );
    }

    #[test]
    fn test_decoder_skips_role_only_and_empty_deltas() {
        let mut decoder = SseDecoder::default();
        let role_only = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n";
        let empty = delta("");
        let decoded = decoder.feed(format!("{role_only}{empty}: keep-alive\n").as_bytes());
        assert!(decoded.items.is_empty());
        assert!(decoded.error.is_none());
    }

    #[test]
    fn test_decoder_reports_error_payloads() {
        let mut decoder = SseDecoder::default();
        let decoded = decoder.feed(b"data: {\"error\":{\"message\":\"model overloaded\"}}\n");
        assert!(decoded.items.is_empty());
        assert!(matches!(decoded.error, Some(LlmError::Stream(ref m)) if m == "model overloaded"));
    }

    #[test]
    fn test_decoder_rejects_malformed_json() {
        let mut decoder = SseDecoder::default();
        assert!(matches!(
            decoder.feed(b"data: {not json}\n").error,
            Some(LlmError::Parse(_))
        ));
    }

    #[test]
    fn test_decoder_keeps_deltas_before_an_error_in_the_same_chunk() {
        let mut decoder = SseDecoder::default();
        let body = format!(
            "{}data: {{\"error\":{{\"message\":\"overloaded\"}}}}\n\n{}",
            delta("Hello"),
            delta("lost")
        );
        let decoded = decoder.feed(body.as_bytes());
        assert_eq!(decoded.items, vec![StreamItem::Delta("Hello".to_string())]);
        assert!(matches!(decoded.error, Some(LlmError::Stream(ref m)) if m == "overloaded"));
    }

    #[tokio::test]
    async fn test_delta_stream_yields_text_then_error_from_one_chunk() {
        let body = format!(
            "{}data: {{\"error\":{{\"message\":\"overloaded\"}}}}\n\n",
            delta("Hello")
        );
        let state = DeltaStream {
            body: stream::iter(vec![Ok(Bytes::from(body))]).boxed(),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            finished: false,
        };
        let items: Vec<Result<String, LlmError>> =
            stream::unfold(state, next_delta).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Hello");
        assert!(matches!(items[1], Err(LlmError::Stream(ref m)) if m == "overloaded"));
    }

    #[test]
    fn test_decoder_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::default();
        let body = delta("tail");
        assert!(decoder.feed(body.trim_end().as_bytes()).items.is_empty());
        assert_eq!(
            decoder.finish().items,
            vec![StreamItem::Delta("tail".to_string())]
        );
    }

    #[test]
    fn test_response_text_ignores_empty_content() {
        let response: LlmResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": ""}}]}"#,
        )
        .unwrap();
        assert!(response.text().is_none());

        let response: LlmResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "hi"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}}"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("hi"));
    }

    #[test]
    fn test_request_serializes_stream_flag_and_roles() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: create_message("sys", "usr"),
            stream: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "usr");
    }

    #[test]
    fn test_completions_url_tolerates_trailing_slash() {
        let client = LlmClient::new(LlmSettings {
            api_key: "ollama".to_string(),
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434/v1/".to_string(),
        })
        .unwrap();
        assert_eq!(
            client.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }
}
