//! UI rendering with ratatui.
//!
//! Two columns: the conversation list on the left and the open conversation
//! with its input line on the right. Message text is wrapped here, before it
//! reaches the `Paragraph`, so the row count handed to the view is exact.

use chrono::{DateTime, Local, Utc};
use eduthread_client::{LiveStatus, LoadState, ThreadView};
use eduthread_core::Message;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState, Wrap,
};
use ratatui::Frame;

use crate::app::{App, Focus, InputMode};

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 2;

/// Render the UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header bar
            Constraint::Min(5),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, main_layout[0]);

    let content_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(main_layout[1]);

    render_threads_panel(frame, app, content_layout[0]);
    render_chat_column(frame, app, content_layout[1]);
    render_status_bar(frame, app, main_layout[2]);

    match app.input_mode.clone() {
        InputMode::Normal => {}
        InputMode::CreatingThread => render_create_thread_dialog(frame, app, area),
        InputMode::ConfirmingDeleteThread => render_confirm_delete_thread(frame, app, area),
        InputMode::ConfirmingDeleteMessage(id) => {
            let preview = app
                .view
                .as_ref()
                .and_then(|v| v.messages().iter().find(|m| m.id == id))
                .map(|m| m.text().to_string())
                .unwrap_or_default();
            render_confirm_delete_message(frame, &preview, area);
        }
    }
}

// =============================================================================
// Text Measurement
// =============================================================================

/// Display width of a string in terminal cells.
fn display_width(s: &str) -> usize {
    Span::raw(s).width()
}

fn char_width(c: char) -> usize {
    let mut buf = [0u8; 4];
    display_width(c.encode_utf8(&mut buf))
}

/// Wrap `text` to rows of at most `width` cells.
///
/// Breaks at spaces where possible and splits words longer than a row.
/// Embedded newlines start a new row. Always returns at least one row.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();

    for paragraph in text.split('\n') {
        let mut row = String::new();
        let mut row_width = 0;

        for word in paragraph.split(' ') {
            let word_width = display_width(word);
            if row_width > 0 {
                if row_width + 1 + word_width <= width {
                    row.push(' ');
                    row.push_str(word);
                    row_width += 1 + word_width;
                    continue;
                }
                rows.push(std::mem::take(&mut row));
                row_width = 0;
            }
            for c in word.chars() {
                let w = char_width(c);
                if row_width + w > width && row_width > 0 {
                    rows.push(std::mem::take(&mut row));
                    row_width = 0;
                }
                row.push(c);
                row_width += w;
            }
        }
        rows.push(row);
    }
    rows
}

/// Visible part of the input line and the cursor column within it.
///
/// Scrolls horizontally so the cursor stays inside `width` cells.
fn visible_input(input: &str, cursor: usize, width: usize) -> (String, usize) {
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());
    let width = width.max(1);

    let mut start = 0;
    let mut col: usize = chars[..cursor].iter().map(|c| char_width(*c)).sum();
    while col >= width && start < cursor {
        col -= char_width(chars[start]);
        start += 1;
    }

    let mut shown = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = char_width(*c);
        if used + w > width {
            break;
        }
        shown.push(*c);
        used += w;
    }
    (shown, col)
}

/// Truncate a string with a trailing ellipsis if it exceeds `max_width` cells.
fn truncate_end(s: &str, max_width: usize) -> String {
    if display_width(s) <= max_width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = char_width(c);
        if used + w + 3 > max_width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push_str("...");
    out
}

fn format_sent_at(sent_at: DateTime<Utc>) -> String {
    let local = sent_at.with_timezone(&Local);
    if local.date_naive() == Local::now().date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%Y-%m-%d %H:%M").to_string()
    }
}

// =============================================================================
// Header and Threads
// =============================================================================

fn live_status_span(app: &App) -> Span<'static> {
    let Some(view) = app.view.as_ref() else {
        return Span::styled("idle", Style::default().fg(Color::Gray));
    };
    match view.live_status() {
        LiveStatus::Off => Span::styled("off", Style::default().fg(Color::Gray)),
        LiveStatus::Connecting | LiveStatus::Connected => {
            Span::styled("connecting", Style::default().fg(Color::Yellow))
        }
        LiveStatus::Joined => Span::styled("live", Style::default().fg(Color::Green)),
        LiveStatus::Reconnecting { attempt } => Span::styled(
            format!("reconnecting #{attempt}"),
            Style::default().fg(Color::Yellow),
        ),
        LiveStatus::Offline(_) => Span::styled("offline", Style::default().fg(Color::Red)),
    }
}

fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "EDUTHREAD";
    let who = format!(
        "{} {} ({})",
        app.me.first_name,
        app.me.last_name,
        app.me.role.as_str()
    );
    let status = live_status_span(app);

    let max_url = (area.width as usize / 2).saturating_sub(who.len() + 20);
    let url = truncate_end(app.server_url(), max_url);
    let right_width = display_width(&url) + who.len() + status.width() + 6;
    let fill = (area.width as usize).saturating_sub(title.len() + right_width);

    let line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(fill)),
        Span::raw(who),
        Span::raw(" @ "),
        Span::raw(url),
        Span::raw(" ["),
        status,
        Span::raw("]"),
    ]);

    frame.render_widget(
        Paragraph::new(line).style(Style::default().bg(Color::DarkGray)),
        area,
    );
}

fn render_threads_panel(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Threads;

    let block = Block::default()
        .title(" Conversations ")
        .borders(Borders::ALL)
        .border_style(if is_focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        });

    let open = app.view.as_ref().map(ThreadView::thread_id);
    let items: Vec<ListItem> = app
        .threads
        .iter()
        .map(|entry| {
            let marker = if open == Some(entry.thread.id) {
                Span::styled(" ●", Style::default().fg(Color::Green))
            } else {
                Span::raw("")
            };
            ListItem::new(Line::from(vec![Span::raw(entry.companion.clone()), marker]))
        })
        .collect();

    if items.is_empty() {
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(
            Paragraph::new("No conversations yet. Press n to start one.")
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true }),
            inner,
        );
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.selected_thread);
    frame.render_stateful_widget(list, area, &mut state);

    if is_focused && app.input_mode == InputMode::Normal && area.height > 4 {
        let help_area = Rect::new(
            area.x + 1,
            area.y + area.height.saturating_sub(2),
            area.width.saturating_sub(2),
            1,
        );
        let help = Paragraph::new(Line::from(vec![
            Span::styled("[n]", Style::default().fg(Color::Yellow)),
            Span::raw("ew "),
            Span::styled("[d]", Style::default().fg(Color::Yellow)),
            Span::raw("elete "),
            Span::styled("[r]", Style::default().fg(Color::Yellow)),
            Span::raw("efresh"),
        ]))
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, help_area);
    }
}

// =============================================================================
// Chat Column
// =============================================================================

/// Top row above the messages. Always present so paging does not shift rows.
fn history_marker(view: &ThreadView, spinner: &str) -> Line<'static> {
    let dim = Style::default().fg(Color::DarkGray);
    if view.history_exhausted() {
        Line::from(Span::styled("· start of conversation ·", dim))
    } else if view.is_loading_older() {
        Line::from(vec![
            Span::styled(spinner.to_string(), Style::default().fg(Color::Yellow)),
            Span::styled(" loading older messages", dim),
        ])
    } else {
        Line::from(Span::styled("↑ scroll up for older messages", dim))
    }
}

fn message_lines(
    message: &Message,
    own: bool,
    selected: bool,
    companion: &str,
    width: usize,
) -> Vec<Line<'static>> {
    let (name, name_style) = if own {
        ("You", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    } else {
        (companion, Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    };
    let name_style = if selected {
        name_style.add_modifier(Modifier::REVERSED)
    } else {
        name_style
    };

    let mut header = vec![
        Span::styled(format_sent_at(message.sent_at), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(name.to_string(), name_style),
    ];
    if own && message.is_read {
        header.push(Span::styled(" ✔", Style::default().fg(Color::Green)));
    }

    let body_style = if message.content.is_none() {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
    } else {
        Style::default().fg(Color::White)
    };
    let body = if message.content.is_none() {
        "(no content)"
    } else {
        message.text()
    };

    let mut lines = vec![Line::from(header)];
    lines.extend(
        wrap_text(body, width)
            .into_iter()
            .map(|row| Line::from(Span::styled(row, body_style))),
    );
    lines.push(Line::from(""));
    lines
}

fn render_chat_column(frame: &mut Frame, app: &mut App, area: Rect) {
    let is_focused = app.focus == Focus::Chat;

    let title = if app.view.is_some() {
        format!(" {} ", app.view_companion)
    } else {
        " Chat ".to_string()
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if is_focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        });

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Messages
            Constraint::Length(1), // Separator or send status
            Constraint::Length(1), // Input line
        ])
        .split(inner_area);

    let chat_area_full = inner_layout[0];
    let chat_area = Rect::new(
        chat_area_full.x + CHAT_PADDING,
        chat_area_full.y,
        chat_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1),
        chat_area_full.height,
    );

    render_messages(frame, app, chat_area, chat_area_full);
    render_separator(frame, app, inner_layout[1]);
    render_input_line(frame, app, inner_layout[2], is_focused);
}

fn render_messages(frame: &mut Frame, app: &mut App, chat_area: Rect, scrollbar_area: Rect) {
    let spinner = app.spinner_char();
    let selected = app.selected_message;
    let companion = app.view_companion.clone();

    let Some(view) = app.view.as_mut() else {
        frame.render_widget(
            Paragraph::new("Select a conversation and press Enter")
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true }),
            chat_area,
        );
        return;
    };

    if view.load_state() == LoadState::Loading {
        let lines = match view.load_error() {
            Some(error) => vec![
                Line::from(Span::styled(
                    "Could not load messages",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(Span::styled(error.to_string(), Style::default().fg(Color::White))),
                Line::from(""),
                Line::from(vec![
                    Span::styled("[Esc] [r]", Style::default().fg(Color::Yellow).bold()),
                    Span::raw(" Retry"),
                ]),
            ],
            None => vec![Line::from(vec![
                Span::styled(spinner.to_string(), Style::default().fg(Color::Yellow)),
                Span::styled(" loading messages...", Style::default().fg(Color::DarkGray)),
            ])],
        };
        frame.render_widget(
            Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true }),
            chat_area,
        );
        return;
    }

    let width = chat_area.width as usize;
    let mut lines = vec![history_marker(view, spinner)];
    if view.messages().is_empty() {
        lines.push(Line::from(Span::styled(
            "No messages yet. Say hello!",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for message in view.messages() {
        let own = view.is_own(message);
        lines.extend(message_lines(
            message,
            own,
            selected == Some(message.id),
            &companion,
            width,
        ));
    }

    let visible = chat_area.height as usize;
    let total = lines.len();
    let offset = view.layout(visible, total);

    let paragraph = Paragraph::new(Text::from(lines))
        .scroll((u16::try_from(offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, chat_area);

    if total > visible {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut state = ScrollbarState::new(total - visible + 1)
            .position(offset)
            .viewport_content_length(visible);
        frame.render_stateful_widget(scrollbar, scrollbar_area, &mut state);
    }
}

fn render_separator(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width as usize;
    let line = match app.view.as_ref() {
        Some(view) if view.is_sending() => Line::from(vec![
            Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
            Span::styled(" sending...", Style::default().fg(Color::DarkGray)),
        ]),
        Some(view) if view.send_error().is_some() => {
            let error = view.send_error().unwrap_or_default();
            Line::from(Span::styled(
                truncate_end(&format!("Not sent: {error} (Esc to dismiss)"), width),
                Style::default().fg(Color::Red),
            ))
        }
        _ => Line::from(Span::styled("─".repeat(width), Style::default().fg(Color::DarkGray))),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_input_line(frame: &mut Frame, app: &App, area: Rect, is_focused: bool) {
    let in_modal = app.input_mode != InputMode::Normal;
    let typing = is_focused && !app.command_mode && app.view.is_some();

    let prompt = if !is_focused {
        "│ "
    } else if app.command_mode {
        ": "
    } else {
        "> "
    };
    let avail = (area.width as usize).saturating_sub(prompt.len());
    let (shown, col) = if in_modal {
        (String::new(), 0)
    } else {
        visible_input(&app.input, app.cursor_position, avail)
    };

    let line = Line::from(vec![
        Span::styled(
            prompt,
            Style::default().fg(if typing { Color::Cyan } else { Color::DarkGray }),
        ),
        Span::styled(shown, Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(line), area);

    if typing && !in_modal {
        let x = area.x as usize + prompt.len() + col;
        frame.set_cursor_position((u16::try_from(x).unwrap_or(area.x), area.y));
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_indicator = match app.focus {
        Focus::Chat if app.command_mode => {
            Span::styled(" COMMAND ", Style::default().fg(Color::Black).bg(Color::Blue))
        }
        Focus::Chat => Span::styled(" CHAT ", Style::default().fg(Color::Black).bg(Color::Green)),
        Focus::Threads => {
            Span::styled(" THREADS ", Style::default().fg(Color::Black).bg(Color::Magenta))
        }
    };

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let status = if let Some(ref error) = app.error_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(" ERROR: ", Style::default().fg(Color::Red).bold()),
            Span::styled(error.clone(), Style::default().fg(Color::Red)),
        ])
    } else if let Some(LiveStatus::Offline(Some(reason))) =
        app.view.as_ref().map(ThreadView::live_status)
    {
        Line::from(vec![
            mode_indicator,
            Span::styled(" ⚠ live updates stopped: ", Style::default().fg(Color::Yellow).bold()),
            Span::styled(reason.clone(), Style::default().fg(Color::Yellow)),
        ])
    } else if let Some(ref status) = app.status_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(format!(" {status}"), Style::default().fg(Color::Green)),
        ])
    } else if app.focus == Focus::Chat && app.command_mode {
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            key("↑/↓"),
            Span::raw(":select "),
            key("d"),
            Span::raw(":delete "),
            key("j/k"),
            Span::raw(":scroll "),
            key("G"),
            Span::raw(":bottom "),
            key("q"),
            Span::raw(":quit "),
            key("Enter"),
            Span::raw(":type"),
        ])
    } else if app.focus == Focus::Chat {
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            key("Enter"),
            Span::raw(":send "),
            key("PgUp/PgDn"),
            Span::raw(":scroll "),
            key("Esc"),
            Span::raw(":command "),
            key("Tab"),
            Span::raw(":switch"),
        ])
    } else {
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            key("Enter"),
            Span::raw(":open "),
            key("n"),
            Span::raw(":new "),
            key("d"),
            Span::raw(":delete "),
            key("q"),
            Span::raw(":quit "),
            key("Tab"),
            Span::raw(":switch"),
        ])
    };

    frame.render_widget(
        Paragraph::new(status).style(Style::default().bg(Color::DarkGray)),
        area,
    );
}

// =============================================================================
// Dialogs
// =============================================================================

fn render_create_thread_dialog(frame: &mut Frame, app: &App, area: Rect) {
    let rows = u16::try_from(app.create_choices.len()).unwrap_or(u16::MAX);
    let dialog_width = 50.min(area.width.saturating_sub(4));
    let dialog_height = rows.saturating_add(5).min(area.height.saturating_sub(4));
    let dialog_area = Rect::new(
        area.x + area.width.saturating_sub(dialog_width) / 2,
        area.y + area.height.saturating_sub(dialog_height) / 2,
        dialog_width,
        dialog_height,
    );

    frame.render_widget(Clear, dialog_area);
    let block = Block::default()
        .title(" New Conversation ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Label
            Constraint::Min(1),    // Choices
            Constraint::Length(1), // Help
        ])
        .split(inner);

    let label = match app.me.role.companion() {
        Some(role) => format!("Choose a {}:", role.as_str().to_lowercase()),
        None => "Choose a person:".to_string(),
    };
    frame.render_widget(Paragraph::new(label), layout[0]);

    let items: Vec<ListItem> = app
        .create_choices
        .iter()
        .map(|c| ListItem::new(c.user.full_name()))
        .collect();
    let list = List::new(items)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(app.create_selected));
    frame.render_stateful_widget(list, layout[1], &mut state);

    frame.render_widget(
        Paragraph::new("Enter to start, Esc to cancel").style(Style::default().fg(Color::DarkGray)),
        layout[2],
    );
}

fn confirm_line() -> Line<'static> {
    Line::from(vec![
        Span::styled("[y]", Style::default().fg(Color::Red).bold()),
        Span::raw(" Yes  "),
        Span::styled("[n]", Style::default().fg(Color::Green).bold()),
        Span::raw(" No"),
    ])
}

fn render_confirm_dialog(frame: &mut Frame, title: &str, lines: Vec<Line<'static>>, area: Rect) {
    let dialog_area = centered_rect(50, 30, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(Color::White))
            .wrap(Wrap { trim: true }),
        inner,
    );
}

fn render_confirm_delete_thread(frame: &mut Frame, app: &App, area: Rect) {
    let name = app
        .selected_thread()
        .map_or_else(|| "?".to_string(), |e| e.companion.clone());
    render_confirm_dialog(
        frame,
        " Delete Conversation ",
        vec![
            Line::from(format!("Delete the conversation with {name}?")),
            Line::from(""),
            Line::from("All of its messages are removed. This cannot be undone."),
            Line::from(""),
            confirm_line(),
        ],
        area,
    );
}

fn render_confirm_delete_message(frame: &mut Frame, preview: &str, area: Rect) {
    render_confirm_dialog(
        frame,
        " Delete Message ",
        vec![
            Line::from("Delete this message?"),
            Line::from(""),
            Line::from(Span::styled(
                truncate_end(preview, 120),
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            )),
            Line::from(""),
            confirm_line(),
        ],
        area,
    );
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Wrapping
    // =========================================================================

    #[test]
    fn wraps_at_word_boundaries() {
        assert_eq!(wrap_text("hello big world", 9), vec!["hello big", "world"]);
    }

    #[test]
    fn splits_words_longer_than_a_row() {
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("hi abcdefgh", 4), vec!["hi", "abcd", "efgh"]);
    }

    #[test]
    fn newlines_start_rows() {
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn wide_characters_count_two_cells() {
        assert_eq!(wrap_text("日本語", 4), vec!["日本", "語"]);
    }

    #[test]
    fn zero_width_does_not_loop() {
        assert_eq!(wrap_text("ab", 0), vec!["a", "b"]);
    }

    // =========================================================================
    // Input Line
    // =========================================================================

    #[test]
    fn short_input_is_shown_whole() {
        assert_eq!(visible_input("hello", 2, 20), ("hello".to_string(), 2));
    }

    #[test]
    fn long_input_scrolls_to_keep_cursor_visible() {
        let (shown, col) = visible_input("abcdefghij", 10, 5);
        assert_eq!(shown, "ghij");
        assert_eq!(col, 4);
    }

    #[test]
    fn truncation_adds_ellipsis() {
        assert_eq!(truncate_end("short", 10), "short");
        assert_eq!(truncate_end("a long message", 8), "a lon...");
    }
}
