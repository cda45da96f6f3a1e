use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use uuid::Uuid;

use crate::app::{Mode, UiApp};
use crate::message::{Message, MessageRole, MessageType};
use crate::reconcile::is_awaiting_response;

/// Rotating status lines shown while the agent is working.
pub const SHIMMER_MESSAGES: &[&str] = &[
    "Thinking...",
    "Generating response...",
    "Fetching data...",
    "Composing the best answer...",
    "Double-checking sources...",
    "Adding final touches...",
    "Almost done...",
];

/// Ticks (50 ms each) before the shimmer advances to its next line.
const SHIMMER_TICKS_PER_MESSAGE: u64 = 40;

pub fn shimmer_message(tick: u64) -> &'static str {
    SHIMMER_MESSAGES[(tick / SHIMMER_TICKS_PER_MESSAGE) as usize % SHIMMER_MESSAGES.len()]
}

/// Render a conversation into lines, returning the line index where each
/// message block starts (used to keep the cursor's message in view).
pub fn render_messages(
    messages: &[Message],
    active_fragment: Option<&Uuid>,
    cursor: usize,
) -> (Vec<Line<'static>>, Vec<usize>) {
    let user_title = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let assistant_title = Style::default()
        .fg(Color::LightGreen)
        .add_modifier(Modifier::BOLD);
    let error_title = Style::default().fg(Color::Red).add_modifier(Modifier::BOLD);
    let error_body = Style::default().fg(Color::Red);
    let body = Style::default();
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut starts: Vec<usize> = Vec::new();

    for (i, message) in messages.iter().enumerate() {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        starts.push(lines.len());

        let marker = if i == cursor { ">> " } else { "   " };
        let (speaker, title_style) = match (message.role, message.kind) {
            (MessageRole::User, _) => ("You", user_title),
            (MessageRole::Assistant, MessageType::Error) => ("Assistant", error_title),
            (MessageRole::Assistant, MessageType::Result) => ("Assistant", assistant_title),
        };
        let time = message
            .created_at
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string();
        lines.push(Line::from(vec![
            Span::styled(marker.to_string(), title_style),
            Span::styled(speaker.to_string(), title_style),
            Span::styled(format!(" · {time}"), dim),
        ]));

        let content_style = if message.kind == MessageType::Error {
            error_body
        } else {
            body
        };
        for text in message.content.lines() {
            lines.push(Line::from(Span::styled(
                format!("   {text}"),
                content_style,
            )));
        }

        if let Some(fragment) = &message.fragment {
            let is_active = active_fragment.is_some_and(|id| id == &fragment.id);
            let card_style = if is_active {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Magenta)
            };
            let badge = if is_active { "◆" } else { "◇" };
            lines.push(Line::from(Span::styled(
                format!("   {badge} {} ({} files)", fragment.title, fragment.files.len()),
                card_style,
            )));
        }
    }

    (lines, starts)
}

/// One shimmer block in the style of an assistant reply, appended while the
/// agent works.
pub fn shimmer_lines(tick: u64) -> Vec<Line<'static>> {
    let title = Style::default()
        .fg(Color::LightGreen)
        .add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    vec![
        Line::from(""),
        Line::from(Span::styled("   Assistant", title)),
        Line::from(Span::styled(
            format!("   {} {}", super::spinner_frame(tick), shimmer_message(tick)),
            dim,
        )),
    ]
}

pub fn draw_chat(frame: &mut Frame, app: &UiApp, area: Rect) {
    if app.mode == Mode::Compose {
        let input_rows = app.prompt.lines.len() as u16;
        let input_height = (input_rows + 3).min(area.height / 3).max(4);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(input_height)])
            .split(area);
        draw_conversation(frame, app, chunks[0]);
        draw_prompt_input(frame, app, chunks[1]);
    } else {
        draw_conversation(frame, app, area);
    }
}

fn draw_conversation(frame: &mut Frame, app: &UiApp, area: Rect) {
    let title = match app.selected_project() {
        Some(project) => format!(" {} ", project.name),
        None => " Chat ".to_string(),
    };
    let border_style = if matches!(app.mode, Mode::Chat | Mode::Compose) {
        Style::default().fg(Color::LightGreen)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let messages = app.selected_messages();
    if app.selected_project().is_none() {
        let placeholder = Paragraph::new(Span::styled(
            "No project selected. Press 'n' to create one.",
            Style::default().add_modifier(Modifier::DIM),
        ));
        frame.render_widget(placeholder, inner);
        return;
    }

    let active_id = app.active_fragment.get().map(|f| f.id);
    let (mut lines, starts) = render_messages(messages, active_id.as_ref(), app.message_cursor);
    if is_awaiting_response(messages) || app.selected_is_generating() {
        lines.extend(shimmer_lines(app.tick));
    }

    let total = lines.len() as u16;
    let height = inner.height;
    let max_scroll = total.saturating_sub(height);
    // Bottom-anchored, adjusted so the cursor's message stays visible.
    let mut scroll_y = max_scroll.saturating_sub(app.chat_scroll.offset);
    if let Some(&start) = starts.get(app.message_cursor) {
        scroll_y = scroll_y.min(start as u16);
    }

    let paragraph = Paragraph::new(lines).scroll((scroll_y, 0));
    frame.render_widget(paragraph, inner);
}

fn draw_prompt_input(frame: &mut Frame, app: &UiApp, area: Rect) {
    let over_budget = app.prompt.char_count() > crate::backend::PROMPT_MAX_CHARS;
    let counter_style = if over_budget {
        Style::default().fg(Color::Red)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    let counter = format!(
        " {}/{} ",
        app.prompt.char_count(),
        crate::backend::PROMPT_MAX_CHARS
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .title(" Prompt ")
        .title_bottom(Line::from(Span::styled(counter, counter_style)).right_aligned())
        .border_style(
            Style::default()
                .fg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let text_height = inner.height.saturating_sub(1);
    let text_area = Rect::new(inner.x, inner.y, inner.width, text_height);
    let hint_area = Rect::new(inner.x, inner.y + text_height, inner.width, 1);

    let prompt_lines: Vec<Line> = app
        .prompt
        .lines
        .iter()
        .map(|l| Line::from(l.clone()))
        .collect();
    frame.render_widget(Paragraph::new(prompt_lines), text_area);

    let hint = Line::from(Span::styled(
        "Enter: send | Esc: cancel",
        Style::default().add_modifier(Modifier::DIM),
    ));
    frame.render_widget(Paragraph::new(hint), hint_area);

    let cursor_x = inner.x + app.prompt.cursor_col as u16;
    let cursor_y = inner.y + app.prompt.cursor_row as u16;
    if cursor_x < inner.x + inner.width && cursor_y < inner.y + text_height {
        frame.set_cursor_position(Position::new(cursor_x, cursor_y));
    }
}
