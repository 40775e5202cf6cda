//! Completion client adapter.
//!
//! `CompletionService` is the seam to the hosted model; `generate_once` and
//! `generate_stream` add the per-mode temperatures and the stream contract on
//! top of whatever service is plugged in.

pub mod openai;

pub use openai::{OpenAIClient, SseDecoder, SseEvent};

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};

use crate::error::CompletionError;
use crate::options::Model;
use crate::state::ChatMessage;

/// Temperature for single-shot form feedback.
pub const FORM_TEMPERATURE: f32 = 0.8;
/// Temperature for streamed chat replies.
pub const CHAT_TEMPERATURE: f32 = 0.3;

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: Model,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// One blocking request returning the full text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Opens a streaming request. Errors opening the stream are returned
    /// directly; errors after that arrive as stream items.
    async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream, CompletionError>;
}

/// Single-shot generation. Returns the trimmed reply; no retry.
pub async fn generate_once(
    service: &dyn CompletionService,
    messages: Vec<ChatMessage>,
    model: Model,
) -> Result<String, CompletionError> {
    let request = CompletionRequest { model, temperature: FORM_TEMPERATURE, messages };
    let text = service.complete(&request).await?;
    Ok(text.trim().to_string())
}

/// Streaming generation. The returned stream never yields an empty fragment
/// and ends right after the first error it yields.
pub async fn generate_stream(
    service: &dyn CompletionService,
    messages: Vec<ChatMessage>,
    model: Model,
) -> Result<FragmentStream, CompletionError> {
    let request = CompletionRequest { model, temperature: CHAT_TEMPERATURE, messages };
    let inner = service.stream(&request).await?;
    Ok(fuse_on_error(inner))
}

fn fuse_on_error(inner: FragmentStream) -> FragmentStream {
    let fused = stream::unfold(Some(inner), |state| async move {
        let mut inner = state?;
        loop {
            match inner.next().await {
                Some(Ok(fragment)) if fragment.is_empty() => continue,
                Some(Ok(fragment)) => return Some((Ok(fragment), Some(inner))),
                Some(Err(err)) => return Some((Err(err), None)),
                None => return None,
            }
        }
    });
    Box::pin(fused.fuse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use std::sync::Mutex;

    /// Replays fixed fragments and records the last request.
    struct ScriptedService {
        reply: String,
        fragments: Vec<Result<&'static str, &'static str>>,
        seen: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedService {
        fn new(reply: &str, fragments: Vec<Result<&'static str, &'static str>>) -> Self {
            Self { reply: reply.to_string(), fragments, seen: Mutex::new(None) }
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(self.reply.clone())
        }

        async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream, CompletionError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            let items: Vec<Result<String, CompletionError>> = self
                .fragments
                .iter()
                .map(|item| match item {
                    Ok(text) => Ok(text.to_string()),
                    Err(message) => Err(CompletionError::Stream(message.to_string())),
                })
                .collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[tokio::test]
    async fn test_generate_once_trims_and_uses_form_temperature() {
        let service = ScriptedService::new("\n  Great thesis.  \n", vec![]);
        let text = generate_once(&service, vec![ChatMessage::user("x")], Model::Gpt4o)
            .await
            .unwrap();
        assert_eq!(text, "Great thesis.");

        let seen = service.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.temperature, FORM_TEMPERATURE);
        assert_eq!(seen.model, Model::Gpt4o);
    }

    #[tokio::test]
    async fn test_stream_concatenates_to_full_text() {
        let service = ScriptedService::new("", vec![Ok("Your "), Ok(""), Ok("thesis "), Ok("is clear.")]);
        let stream = generate_stream(&service, vec![ChatMessage::user("x")], Model::Gpt4oMini)
            .await
            .unwrap();
        let fragments: Vec<String> = stream.try_collect().await.unwrap();

        assert_eq!(fragments, vec!["Your ", "thesis ", "is clear."]);
        assert_eq!(fragments.concat(), "Your thesis is clear.");
        let seen = service.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.temperature, CHAT_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_stream_ends_after_first_error() {
        let service = ScriptedService::new("", vec![Ok("partial"), Err("connection reset"), Ok("never")]);
        let mut stream = generate_stream(&service, vec![], Model::Gpt4oMini).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }
}
