use crate::state::{ChatMessage, ChatRole};

/// Append-only chat log for one session.
///
/// Turns are recorded whole: the user input and the assistant's final text
/// (which may be an error message) go in together, so the log always
/// alternates user/assistant. Nothing is ever truncated or summarised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_turn(&mut self, input: impl Into<String>, answer: impl Into<String>) {
        self.messages.push(ChatMessage::user(input));
        self.messages.push(ChatMessage::assistant(answer));
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == ChatRole::User).count()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
