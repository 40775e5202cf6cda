use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use essay_core::Mode;

use crate::app::{App, InputMode, LoginField, TextInput};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Fragment { owner, text } => app.on_fragment(&owner, &text),
        AppEvent::FormFinished { owner, outcome } => app.on_form_finished(&owner, outcome),
        AppEvent::ChatFinished { owner, outcome } => app.on_chat_finished(&owner, outcome),
        AppEvent::Audit { owner, ui, outcome } => app.on_audit(&owner, ui, outcome),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match (app.mode(), app.input_mode) {
        (Mode::LoggedOut, _) => handle_login(app, key),
        (Mode::Form, InputMode::Normal) => handle_form_normal(app, key),
        (Mode::Form, InputMode::Editing) => handle_form_editing(app, key),
        (Mode::Chat, InputMode::Normal) => handle_chat_normal(app, key),
        (Mode::Chat, InputMode::Editing) => handle_chat_editing(app, key),
    }
}

fn is_submit(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Cursor movement and character editing shared by every text field.
/// Returns false for keys it does not handle.
fn edit_text(input: &mut TextInput, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.left(),
        KeyCode::Right => input.right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => input.insert(c),
        _ => return false,
    }
    true
}

fn handle_login(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => app.submit_login(),
        KeyCode::Tab | KeyCode::Down => app.login_field = app.login_field.next(),
        KeyCode::BackTab | KeyCode::Up => app.login_field = app.login_field.prev(),
        _ => match app.login_field {
            LoginField::Name => {
                edit_text(&mut app.login_name, key);
            }
            LoginField::Passphrase => {
                edit_text(&mut app.login_passphrase, key);
            }
            LoginField::Destination => {
                if matches!(key.code, KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')) {
                    app.login_destination = app.login_destination.toggled();
                }
            }
        },
    }
}

/// Keys shared by both modes when not typing.
fn handle_common_normal(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('o') => app.logout(),
        KeyCode::Char('m') | KeyCode::Tab => app.toggle_mode(),
        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('l') => app.cycle_length(),
        KeyCode::Esc => app.notice = None,
        _ => return false,
    }
    true
}

fn handle_form_normal(app: &mut App, key: KeyEvent) {
    if is_submit(&key) {
        app.submit_form();
        return;
    }
    if handle_common_normal(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('s') => app.submit_form(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_feedback_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_feedback_up(),
        _ => {}
    }
}

fn handle_form_editing(app: &mut App, key: KeyEvent) {
    if is_submit(&key) {
        app.submit_form();
        return;
    }
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.essay.insert('\n'),
        _ => {
            edit_text(&mut app.essay, key);
        }
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    if handle_common_normal(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('n') => app.new_conversation(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit_chat(),
        _ => {
            edit_text(&mut app.chat_input, key);
        }
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        KeyCode::Esc => app.show_model_picker = false,
        _ => {}
    }
}
