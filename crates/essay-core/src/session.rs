use crate::conversation::Conversation;
use crate::gate::Identity;
use crate::options::{LengthHint, Model, UiMode};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    LoggedOut,
    Form,
    Chat,
}

impl From<UiMode> for Mode {
    fn from(ui: UiMode) -> Self {
        match ui {
            UiMode::Form => Mode::Form,
            UiMode::Chat => Mode::Chat,
        }
    }
}

impl Mode {
    pub fn ui_mode(&self) -> Option<UiMode> {
        match self {
            Mode::LoggedOut => None,
            Mode::Form => Some(UiMode::Form),
            Mode::Chat => Some(UiMode::Chat),
        }
    }
}

/// Everything one user interaction owns. Passed explicitly to every
/// controller operation; nothing about a session lives anywhere else.
#[derive(Debug, Clone, Default)]
pub struct Session {
    mode: Mode,
    identity: Option<Identity>,
    conversation: Conversation,
    pub model: Model,
    pub length_hint: LengthHint,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub(crate) fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    /// Starts a fresh authenticated session in `destination`, dropping any
    /// earlier conversation.
    pub(crate) fn authenticate(&mut self, identity: Identity, destination: UiMode) {
        self.identity = Some(identity);
        self.mode = destination.into();
        self.conversation.clear();
    }

    pub(crate) fn set_mode(&mut self, ui: UiMode) {
        self.mode = ui.into();
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
