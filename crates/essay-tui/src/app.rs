use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use essay_core::{
    AuthError, ChatOutcome, FormOutcome, LogOutcome, Mode, ModeController, Model, Notice, Session,
    SessionError, UiMode,
};

use crate::tui::AppEvent;

const BUSY_MESSAGE: &str = "Still generating. Please wait for the current answer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Name,
    Passphrase,
    Destination,
}

impl LoginField {
    pub fn next(self) -> Self {
        match self {
            LoginField::Name => LoginField::Passphrase,
            LoginField::Passphrase => LoginField::Destination,
            LoginField::Destination => LoginField::Name,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            LoginField::Name => LoginField::Destination,
            LoginField::Passphrase => LoginField::Name,
            LoginField::Destination => LoginField::Passphrase,
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Editable text with a cursor counted in characters.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub text: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    /// (row, column) of the cursor, for multi-line editors.
    pub fn cursor_position(&self) -> (u16, u16) {
        let before: String = self.text.chars().take(self.cursor).collect();
        let row = before.matches('\n').count();
        let col = before.rsplit('\n').next().map(|line| line.chars().count()).unwrap_or(0);
        let clamp = |n: usize| u16::try_from(n).unwrap_or(u16::MAX);
        (clamp(row), clamp(col))
    }
}

/// Last form-mode result panel contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub text: String,
    pub failed: bool,
}

/// A generation running on a background task, keyed by the login it
/// belongs to so results from an earlier session can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub owner: String,
    pub ui: UiMode,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub session: Session,
    controller: ModeController,
    events: UnboundedSender<AppEvent>,

    // Login form
    pub login_field: LoginField,
    pub login_name: TextInput,
    pub login_passphrase: TextInput,
    pub login_destination: UiMode,

    // Form mode
    pub essay: TextInput,
    pub feedback: Option<Feedback>,
    pub feedback_scroll: u16,

    // Chat mode
    pub chat_input: TextInput,
    pub pending_input: Option<String>,
    pub streaming: Option<String>,
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the chat area, set during render
    pub chat_width: u16,

    pub in_flight: Option<InFlight>,
    pub notice: Option<Notice>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub model_picker_state: ListState,
}

impl App {
    pub fn new(controller: ModeController, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            session: Session::new(),
            controller,
            events,

            login_field: LoginField::default(),
            login_name: TextInput::default(),
            login_passphrase: TextInput::default(),
            login_destination: UiMode::default(),

            essay: TextInput::default(),
            feedback: None,
            feedback_scroll: 0,

            chat_input: TextInput::default(),
            pending_input: None,
            streaming: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            in_flight: None,
            notice: None,
            animation_frame: 0,

            show_model_picker: false,
            model_picker_state: ListState::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.session.mode()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn owns(&self, owner: &str) -> bool {
        self.in_flight.as_ref().is_some_and(|job| job.owner == owner)
    }

    fn current_owner(&self) -> String {
        self.session
            .identity()
            .map(|identity| identity.user_id.clone())
            .unwrap_or_default()
    }

    fn clear_workspace(&mut self) {
        self.essay.clear();
        self.feedback = None;
        self.feedback_scroll = 0;
        self.chat_input.clear();
        self.pending_input = None;
        self.streaming = None;
        self.chat_scroll = 0;
        self.in_flight = None;
        self.show_model_picker = false;
    }

    // Session actions

    pub fn submit_login(&mut self) {
        let name = self.login_name.text.clone();
        let passphrase = self.login_passphrase.take();

        match self.controller.login(&mut self.session, &name, &passphrase, self.login_destination) {
            Ok(()) => {
                self.clear_workspace();
                self.login_field = LoginField::Name;
                self.input_mode = InputMode::Normal;
                self.notice = self
                    .session
                    .identity()
                    .map(|identity| Notice::Info(format!("Welcome, {}.", identity.display_name)));
            }
            Err(err) => {
                self.login_field = match err {
                    AuthError::EmptyName => LoginField::Name,
                    AuthError::WrongPassphrase => LoginField::Passphrase,
                };
                self.notice = Some(Notice::Error(err.to_string()));
            }
        }
    }

    pub fn logout(&mut self) {
        self.controller.logout(&mut self.session);
        self.clear_workspace();
        self.login_name.clear();
        self.login_passphrase.clear();
        self.login_field = LoginField::Name;
        self.input_mode = InputMode::Editing;
        self.notice = Some(Notice::Info("Logged out.".to_string()));
    }

    pub fn toggle_mode(&mut self) {
        let Some(current) = self.mode().ui_mode() else {
            return;
        };
        match self.controller.select_mode(&mut self.session, current.toggled()) {
            Ok(()) => self.input_mode = InputMode::Normal,
            Err(err) => self.notice = Some(Notice::Error(err.to_string())),
        }
    }

    pub fn cycle_length(&mut self) {
        self.session.length_hint = self.session.length_hint.next();
    }

    pub fn new_conversation(&mut self) {
        if self.in_flight.as_ref().is_some_and(|job| job.ui == UiMode::Chat) {
            self.notice = Some(Notice::Warning(BUSY_MESSAGE.to_string()));
            return;
        }
        match self.controller.new_conversation(&mut self.session) {
            Ok(()) => {
                self.chat_scroll = 0;
                self.notice = Some(Notice::Info("Started a new conversation.".to_string()));
            }
            Err(err) => self.notice = Some(Notice::Error(err.to_string())),
        }
    }

    // Submissions

    pub fn submit_form(&mut self) {
        if self.is_busy() {
            self.notice = Some(Notice::Warning(BUSY_MESSAGE.to_string()));
            return;
        }
        let job = match self.controller.prepare_form(&self.session, &self.essay.text) {
            Ok(job) => job,
            Err(err) => {
                self.notice = Some(rejection_notice(err, UiMode::Form));
                return;
            }
        };

        let owner = self.current_owner();
        self.in_flight = Some(InFlight { owner: owner.clone(), ui: UiMode::Form });
        self.feedback = None;
        self.feedback_scroll = 0;
        self.notice = None;
        self.input_mode = InputMode::Normal;

        let controller = self.controller.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let outcome = controller.run_form(job).await;
            let _ = tx.send(AppEvent::FormFinished { owner, outcome });
        });
    }

    pub fn submit_chat(&mut self) {
        if self.is_busy() {
            self.notice = Some(Notice::Warning(BUSY_MESSAGE.to_string()));
            return;
        }
        let job = match self.controller.prepare_chat(&self.session, &self.chat_input.text) {
            Ok(job) => job,
            Err(err) => {
                self.notice = Some(rejection_notice(err, UiMode::Chat));
                return;
            }
        };

        let owner = self.current_owner();
        self.in_flight = Some(InFlight { owner: owner.clone(), ui: UiMode::Chat });
        self.pending_input = Some(job.input().to_string());
        self.streaming = Some(String::new());
        self.chat_input.clear();
        self.notice = None;
        self.scroll_chat_to_bottom();

        let controller = self.controller.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let fragment_tx = tx.clone();
            let fragment_owner = owner.clone();
            let outcome = controller
                .run_chat(job, move |text| {
                    let _ = fragment_tx.send(AppEvent::Fragment {
                        owner: fragment_owner.clone(),
                        text: text.to_string(),
                    });
                })
                .await;
            let _ = tx.send(AppEvent::ChatFinished { owner, outcome });
        });
    }

    // Background results

    pub fn on_fragment(&mut self, owner: &str, text: &str) {
        if !self.owns(owner) {
            return;
        }
        if let Some(buffer) = self.streaming.as_mut() {
            buffer.push_str(text);
        }
        self.scroll_chat_to_bottom();
    }

    pub fn on_form_finished(&mut self, owner: &str, outcome: FormOutcome) {
        if !self.owns(owner) {
            tracing::debug!("discarding form result from an earlier session");
            return;
        }
        self.in_flight = None;

        let FormOutcome { feedback, failed, audit } = outcome;
        self.feedback = Some(Feedback { text: feedback, failed });
        if let Some(handle) = audit {
            self.watch_audit(owner, UiMode::Form, handle);
        }
    }

    pub fn on_chat_finished(&mut self, owner: &str, outcome: ChatOutcome) {
        if !self.owns(owner) {
            tracing::debug!("discarding chat reply from an earlier session");
            return;
        }
        self.in_flight = None;
        self.pending_input = None;
        self.streaming = None;

        self.controller.commit_chat(&mut self.session, &outcome);
        self.scroll_chat_to_bottom();
        self.watch_audit(owner, UiMode::Chat, outcome.audit);
    }

    /// Audit writes can outlive the login that started them; their notices
    /// only show in that same login.
    pub fn on_audit(&mut self, owner: &str, ui: UiMode, outcome: LogOutcome) {
        let same_login = self.session.identity().is_some_and(|identity| identity.user_id == owner);
        if !same_login {
            tracing::debug!("dropping audit notice from an earlier session");
            return;
        }
        if let Some(notice) = outcome.notice(ui) {
            self.notice = Some(notice);
        }
    }

    /// Waits for the audit write off the event loop and reports its outcome.
    fn watch_audit(&self, owner: &str, ui: UiMode, handle: JoinHandle<LogOutcome>) {
        let tx = self.events.clone();
        let owner = owner.to_string();
        tokio::spawn(async move {
            match handle.await {
                Ok(outcome) => {
                    let _ = tx.send(AppEvent::Audit { owner, ui, outcome });
                }
                Err(err) => tracing::warn!(%err, "audit task did not complete"),
            }
        });
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Scrolling

    pub fn scroll_feedback_down(&mut self) {
        self.feedback_scroll = self.feedback_scroll.saturating_add(1);
    }

    pub fn scroll_feedback_up(&mut self) {
        self.feedback_scroll = self.feedback_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll chat so the newest text (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };

        let wrapped = |text: &str| -> usize {
            text.lines()
                .map(|line| {
                    // Use character count, not byte length, for proper UTF-8 handling
                    let char_count = line.chars().count();
                    if char_count == 0 { 1 } else { (char_count / wrap_width) + 1 }
                })
                .sum()
        };

        // Counted in usize; the history has no length cap.
        let mut total_lines: usize = 0;
        for msg in self.session.conversation().history() {
            total_lines += 2 + wrapped(&msg.content); // Role line + content + blank line
        }
        if let Some(input) = &self.pending_input {
            total_lines += 2 + wrapped(input);
        }
        if let Some(answer) = &self.streaming {
            total_lines += 1 + wrapped(answer).max(1);
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        let scroll = total_lines.saturating_sub(visible_height as usize);
        self.chat_scroll = u16::try_from(scroll).unwrap_or(u16::MAX);
    }

    // Model picker methods

    pub fn open_model_picker(&mut self) {
        let current = Model::all().iter().position(|m| *m == self.session.model);
        self.model_picker_state.select(current.or(Some(0)));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = Model::all().len();
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(model) = self.model_picker_state.selected().and_then(|i| Model::all().get(i).copied()) {
            self.session.model = model;
            tracing::info!(model = model.as_str(), "model selected");
        }
        self.show_model_picker = false;
    }
}

fn rejection_notice(err: SessionError, ui: UiMode) -> Notice {
    match err {
        SessionError::EmptyInput => Notice::Warning(
            match ui {
                UiMode::Form => "Please enter your essay.",
                UiMode::Chat => "Please type a message.",
            }
            .to_string(),
        ),
        other => Notice::Error(other.to_string()),
    }
}
