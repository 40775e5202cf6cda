//! Prompt assembly for both front-end modes.
//!
//! Nothing here validates or rewrites user text; it is passed through as-is.

use std::sync::OnceLock;

use crate::guide::ESSAY_GUIDE;
use crate::options::{LengthHint, Model, GENERAL_ESSAY_RUBRIC};
use crate::state::ChatMessage;

/// One form-mode request. Built per submission and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRequest {
    pub essay_text: String,
    pub rubric: &'static str,
    pub length_hint: LengthHint,
    pub model: Model,
}

impl FeedbackRequest {
    pub fn new(essay_text: impl Into<String>, length_hint: LengthHint, model: Model) -> Self {
        Self {
            essay_text: essay_text.into(),
            rubric: GENERAL_ESSAY_RUBRIC,
            length_hint,
            model,
        }
    }
}

pub fn system_prompt_form() -> &'static str {
    static PROMPT: OnceLock<String> = OnceLock::new();
    PROMPT.get_or_init(|| {
        format!(
            "You are a graduate-level writing coach. \
             Evaluate the user's general essay against the guidelines below and give feedback.\n\n\
             {ESSAY_GUIDE}\n\n\
             Output format: overall / strengths / improvements / sentence-level suggestions / score.\n\
             Never invent citations; phrase advice as recommendations rather than verdicts."
        )
    })
}

pub fn system_prompt_chat() -> &'static str {
    static PROMPT: OnceLock<String> = OnceLock::new();
    PROMPT.get_or_init(|| {
        format!(
            "You are a graduate-level writing coach. \
             Give feedback on the essay, paragraph or sentence the user sends, following the guidelines below.\n\n\
             {ESSAY_GUIDE}\n\n\
             Output format: \
             1) overall (2-3 sentences), \
             2) strengths (3-5 bullets), \
             3) top 5 improvements (include why and how), \
             4) sentence-level suggestions (only where needed: original / suggestion / reason), \
             5) score (structure and logic / evidence / clarity and concision / academic tone / overall). \
             Never invent citations; phrase advice as recommendations rather than verdicts."
        )
    })
}

/// System prompt followed by one user message carrying the essay and a small
/// labeled rubric block.
pub fn build_single_shot(request: &FeedbackRequest) -> Vec<ChatMessage> {
    let body = format!(
        "[Essay]\n{}\n\n[Rubric]\n- criteria: {}\n- length: {}",
        request.essay_text,
        request.rubric,
        request.length_hint.as_str()
    );
    vec![ChatMessage::system(system_prompt_form()), ChatMessage::user(body)]
}

/// System prompt, the whole prior conversation in order, a rubric/length hint,
/// then the new input.
pub fn build_multi_turn(
    history: &[ChatMessage],
    rubric: &str,
    length_hint: LengthHint,
    input: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::system(system_prompt_chat()));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(rubric_hint(rubric, length_hint)));
    messages.push(ChatMessage::user(input));
    messages
}

fn rubric_hint(rubric: &str, length_hint: LengthHint) -> String {
    format!("[Rubric] criteria={} / length={}", rubric, length_hint.as_str())
}
