use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{CompletionRequest, CompletionService, FragmentStream};
use crate::error::CompletionError;
use crate::state::ChatMessage;

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'static str,
    temperature: f32,
    messages: Vec<OpenAIMessage<'a>>,
    stream: bool,
}

impl<'a> OpenAIRequest<'a> {
    fn new(request: &'a CompletionRequest, stream: bool) -> Self {
        Self {
            model: request.model.as_str(),
            temperature: request.temperature,
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            stream,
        }
    }
}

impl<'a> From<&'a ChatMessage> for OpenAIMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self { role: message.role.as_str(), content: &message.content }
    }
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIErrorBody,
}

#[derive(Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

/// Chat Completions client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn send(&self, body: &OpenAIRequest<'_>) -> Result<Response, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &text));
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionService for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = OpenAIRequest::new(request, false);
        let response = self.send(&body).await?;
        let parsed: OpenAIResponse = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream, CompletionError> {
        let body = OpenAIRequest::new(request, true);
        let response = self.send(&body).await?;
        Ok(sse_fragments(response))
    }
}

fn map_api_error(status: u16, body: &str) -> CompletionError {
    let message = serde_json::from_str::<OpenAIErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    CompletionError::Api { status, message }
}

/// One decoded server-sent event from a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Error(String),
    Done,
}

/// Incremental decoder for the `data:` lines of a streaming response.
/// Bytes may be split anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the end-of-stream marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        if self.done {
            return None;
        }
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let data = line.strip_prefix("data:")?.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return Some(SseEvent::Done);
        }

        let json: JsonValue = match serde_json::from_str(data) {
            Ok(json) => json,
            Err(err) => {
                tracing::debug!(%err, "skipping malformed stream chunk");
                return None;
            }
        };

        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Some(SseEvent::Error(message));
        }

        json["choices"]
            .get(0)
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(|c| c.as_str())
            .filter(|text| !text.is_empty())
            .map(|text| SseEvent::Delta(text.to_string()))
    }
}

struct SseState {
    response: Response,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    eof: bool,
}

/// Turns a streaming HTTP body into fragments. A transport error, an error
/// payload, or EOF without `[DONE]` ends the stream with one `Err`.
fn sse_fragments(response: Response) -> FragmentStream {
    let state = SseState {
        response,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        eof: false,
    };

    Box::pin(stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            match state.pending.pop_front() {
                Some(SseEvent::Delta(text)) => return Some((Ok(text), Some(state))),
                Some(SseEvent::Error(message)) => {
                    return Some((Err(CompletionError::Stream(message)), None))
                }
                Some(SseEvent::Done) => return None,
                None if state.eof => {
                    return if state.decoder.is_done() {
                        None
                    } else {
                        Some((Err(CompletionError::Truncated), None))
                    };
                }
                None => {}
            }

            match state.response.chunk().await {
                Ok(Some(bytes)) => {
                    let events = state.decoder.push(&bytes);
                    state.pending.extend(events);
                }
                Ok(None) => {
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                    state.eof = true;
                }
                Err(err) => return Some((Err(CompletionError::Transport(err)), None)),
            }
        }
    }))
}
