use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use essay_core::guide::CHECKLISTS;
use essay_core::{ChatRole, Mode, Model, Notice, UiMode, GENERAL_ESSAY_RUBRIC};

use crate::app::{App, InputMode, LoginField};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn markdown_text(text: &str) -> Vec<Line<'static>> {
    text.lines().map(parse_markdown_line).collect()
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, notice, footer
    let [header_area, body_area, notice_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.mode() {
        Mode::LoggedOut => render_login_screen(app, frame, body_area),
        Mode::Form | Mode::Chat => {
            let [sidebar_area, main_area] =
                Layout::horizontal([Constraint::Length(30), Constraint::Min(0)]).areas(body_area);
            render_sidebar(app, frame, sidebar_area);
            if app.mode() == Mode::Form {
                render_form_screen(app, frame, main_area);
            } else {
                render_chat_screen(app, frame, main_area);
            }
        }
    }

    render_notice(app, frame, notice_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mode = match app.mode() {
        Mode::LoggedOut => String::new(),
        Mode::Form => " [form] ".to_string(),
        Mode::Chat => " [chat] ".to_string(),
    };

    let title = Line::from(vec![
        Span::styled(" Essay Feedback ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(mode, Style::default().fg(Color::White)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_login_screen(app: &App, frame: &mut Frame, area: Rect) {
    let width = 56.min(area.width.saturating_sub(4));
    let height = 13.min(area.height);
    let login_area = Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Log in ");
    let inner = block.inner(login_area);
    frame.render_widget(block, login_area);

    let label = |field: LoginField, text: &'static str| {
        let style = if app.login_field == field {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Line::from(Span::styled(text, style))
    };

    let masked = "*".repeat(app.login_passphrase.text.chars().count());
    let destination = [UiMode::Form, UiMode::Chat]
        .into_iter()
        .flat_map(|ui| {
            let style = if ui == app.login_destination {
                Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            [Span::styled(format!(" {} ", ui.display_name()), style), Span::raw(" ")]
        })
        .collect::<Vec<_>>();

    let lines = vec![
        Line::from(Span::styled(
            "Enter your name and the class passphrase.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        label(LoginField::Name, "Name"),
        Line::from(format!("  {}", app.login_name.text)),
        Line::default(),
        label(LoginField::Passphrase, "Passphrase"),
        Line::from(format!("  {}", masked)),
        Line::default(),
        label(LoginField::Destination, "Start in"),
        Line::from([vec![Span::raw("  ")], destination].concat()),
    ];
    frame.render_widget(Paragraph::new(lines), inner);

    // Show cursor in the focused text field
    let cursor = match app.login_field {
        LoginField::Name => Some((app.login_name.cursor, 3)),
        LoginField::Passphrase => Some((app.login_passphrase.cursor, 6)),
        LoginField::Destination => None,
    };
    if let Some((col, row)) = cursor {
        let x = (inner.x + 2 + col as u16).min(inner.right().saturating_sub(1));
        frame.set_cursor_position((x, inner.y + row));
    }
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Session ");

    let key = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);

    let mut lines = Vec::new();
    if let Some(identity) = app.session.identity() {
        lines.push(Line::from(vec![
            Span::styled("User  ", key),
            Span::styled(identity.display_name.clone(), value),
        ]));
        lines.push(Line::from(vec![
            Span::styled("ID    ", key),
            Span::styled(identity.user_id.clone(), Style::default().fg(Color::Cyan)),
        ]));
        lines.push(Line::default());
    }
    let mode = app.mode().ui_mode().map(|ui| ui.display_name()).unwrap_or("-");
    lines.extend([
        Line::from(vec![Span::styled("Mode   ", key), Span::styled(mode, value)]),
        Line::from(vec![
            Span::styled("Model  ", key),
            Span::styled(app.session.model.as_str(), value),
        ]),
        Line::from(vec![
            Span::styled("Length ", key),
            Span::styled(app.session.length_hint.display_name(), value),
        ]),
        Line::from(vec![
            Span::styled("Rubric ", key),
            Span::styled(GENERAL_ESSAY_RUBRIC, value),
        ]),
    ]);
    if app.mode() == Mode::Chat {
        lines.push(Line::from(vec![
            Span::styled("Turns  ", key),
            Span::styled(app.session.conversation().turns().to_string(), value),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Everything you submit and every answer is recorded. Do not enter personal information.",
        Style::default().fg(Color::Yellow),
    )));

    let sidebar = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(sidebar, area);
}

fn render_form_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [work_area, guide_area] =
        Layout::horizontal([Constraint::Percentage(65), Constraint::Percentage(35)]).areas(area);
    let [editor_area, feedback_area] =
        Layout::vertical([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(work_area);

    // Essay editor
    let editing = app.input_mode == InputMode::Editing;
    let editor_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Essay ");
    let editor_inner = editor_block.inner(editor_area);

    let (cursor_row, cursor_col) = app.essay.cursor_position();
    let editor_scroll = cursor_row.saturating_sub(editor_inner.height.saturating_sub(1));
    let editor_text = if app.essay.text.is_empty() && !editing {
        Text::from(Span::styled(
            "Press i to start writing your essay...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(app.essay.text.as_str())
    };
    frame.render_widget(
        Paragraph::new(editor_text).block(editor_block).scroll((editor_scroll, 0)),
        editor_area,
    );
    if editing {
        let x = (editor_inner.x + cursor_col).min(editor_inner.right().saturating_sub(1));
        frame.set_cursor_position((x, editor_inner.y + cursor_row - editor_scroll));
    }

    // Result panel
    let feedback_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::DarkGray } else { Color::Cyan }))
        .title(format!(" Feedback ({}) ", app.session.model.as_str()));

    let feedback_text = match (&app.feedback, app.is_busy()) {
        (_, true) => {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            Text::from(Span::styled(
                format!("Generating feedback{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ))
        }
        (Some(feedback), false) if feedback.failed => {
            Text::from(Span::styled(feedback.text.clone(), Style::default().fg(Color::Red)))
        }
        (Some(feedback), false) => Text::from(markdown_text(&feedback.text)),
        (None, false) => Text::from(Span::styled(
            "Submit your essay to receive feedback.",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(
        Paragraph::new(feedback_text)
            .block(feedback_block)
            .wrap(Wrap { trim: false })
            .scroll((app.feedback_scroll, 0)),
        feedback_area,
    );

    render_guide(frame, guide_area);
}

fn render_guide(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Writing guide ");

    let mut lines = Vec::new();
    for checklist in CHECKLISTS {
        lines.push(Line::from(Span::styled(
            checklist.title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for item in checklist.items {
            lines.push(Line::from(format!("[ ] {}", item)));
        }
        lines.push(Line::default());
    }

    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Chat: {} ", app.session.model.as_str()));

    let history = app.session.conversation().history();
    let chat_text = if history.is_empty() && app.pending_input.is_none() {
        Text::from(Span::styled(
            "Paste a paragraph or ask about your essay...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        let you = || {
            Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ))
        };
        let tutor = || {
            Line::from(Span::styled(
                "Tutor:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))
        };

        for msg in history {
            match msg.role {
                ChatRole::User => {
                    lines.push(you());
                    lines.extend(msg.content.lines().map(|line| Line::from(line.to_string())));
                }
                ChatRole::Assistant => {
                    lines.push(tutor());
                    lines.extend(markdown_text(&msg.content));
                }
                ChatRole::System => continue,
            }
            lines.push(Line::default());
        }

        if let Some(input) = &app.pending_input {
            lines.push(you());
            lines.extend(input.lines().map(|line| Line::from(line.to_string())));
            lines.push(Line::default());
            lines.push(tutor());
            match app.streaming.as_deref() {
                Some(answer) if !answer.is_empty() => lines.extend(markdown_text(answer)),
                _ => {
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("Thinking{}", dots),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                }
            }
        }

        Text::from(lines)
    };

    frame.render_widget(
        Paragraph::new(chat_text)
            .block(chat_block)
            .wrap(Wrap { trim: false })
            .scroll((app.chat_scroll, 0)),
        chat_area,
    );

    // Input box
    let editing = app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Message ");
    let input_inner = input_block.inner(input_area);
    frame.render_widget(
        Paragraph::new(app.chat_input.text.as_str()).block(input_block),
        input_area,
    );
    if editing {
        let x = (input_inner.x + app.chat_input.cursor as u16).min(input_inner.right().saturating_sub(1));
        frame.set_cursor_position((x, input_inner.y));
    }
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let (prefix, color) = match notice {
        Notice::Info(_) => ("", Color::Cyan),
        Notice::Success(_) => ("OK ", Color::Green),
        Notice::Warning(_) => ("! ", Color::Yellow),
        Notice::Error(_) => ("x ", Color::Red),
    };
    let line = Line::from(Span::styled(format!(" {}{}", prefix, notice.text()), Style::default().fg(color)));
    frame.render_widget(Paragraph::new(line), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.mode() {
        Mode::LoggedOut => " LOGIN ",
        Mode::Form => " FORM ",
        Mode::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(format!(" {} ", key), key_style), Span::styled(format!(" {} ", label), label_style)]
    };

    let mut pairs = Vec::new();
    match (app.mode(), app.input_mode) {
        _ if app.show_model_picker => {
            pairs.extend([hint("j/k", "nav"), hint("Enter", "select"), hint("Esc", "cancel")]);
        }
        (Mode::LoggedOut, _) => {
            pairs.extend([hint("Tab", "next field"), hint("Enter", "log in"), hint("Esc", "quit")]);
        }
        (Mode::Form, InputMode::Normal) => {
            pairs.extend([hint("i", "edit"), hint("s", "submit"), hint("j/k", "scroll")]);
        }
        (Mode::Form, InputMode::Editing) => {
            pairs.extend([hint("Ctrl+S", "submit"), hint("Esc", "stop typing")]);
        }
        (Mode::Chat, InputMode::Normal) => {
            pairs.extend([hint("i", "type"), hint("n", "new chat"), hint("j/k", "scroll")]);
        }
        (Mode::Chat, InputMode::Editing) => {
            pairs.extend([hint("Enter", "send"), hint("Esc", "stop typing")]);
        }
    }
    if app.input_mode == InputMode::Normal && app.mode() != Mode::LoggedOut && !app.show_model_picker {
        pairs.extend([
            hint("m", "mode"),
            hint("M", "model"),
            hint("l", "length"),
            hint("o", "log out"),
            hint("q", "quit"),
        ]);
    }

    let footer_content = Line::from(
        vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(pairs.into_iter().flatten())
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let models = Model::all();

    // Calculate popup size and position (centered)
    let popup_width = 40.min(area.width.saturating_sub(4));
    let popup_height = (models.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model ");

    let items: Vec<ListItem> = models
        .iter()
        .map(|model| {
            let style = if *model == app.session.model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model.display_name())).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}
