pub mod chat;
pub mod state;
pub mod workspace;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use crate::app::{Mode, UiApp};

/// Braille spinner shown next to projects with a generation in flight.
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Screen regions the mouse handler needs to hit-test against.
#[derive(Debug, Clone, Copy)]
pub struct UiLayout {
    pub sidebar: Rect,
    pub chat: Rect,
    pub workspace: Rect,
    pub help: Rect,
}

pub fn compute_layout(area: Rect) -> UiLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(40),
            Constraint::Percentage(40),
        ])
        .split(rows[0]);

    UiLayout {
        sidebar: panels[0],
        chat: panels[1],
        workspace: panels[2],
        help: rows[1],
    }
}

pub fn draw(frame: &mut Frame, app: &UiApp) {
    let layout = compute_layout(frame.area());

    draw_sidebar(frame, app, layout.sidebar);
    chat::draw_chat(frame, app, layout.chat);
    workspace::draw_workspace(frame, app, layout.workspace);
    draw_help_bar(frame, app, layout.help);

    match app.mode {
        Mode::NewProject => draw_new_project(frame, app),
        Mode::ConfirmDelete => draw_confirm_delete(frame, app),
        _ => {}
    }
}

pub fn spinner_frame(tick: u64) -> &'static str {
    SPINNER_FRAMES[(tick / 2) as usize % SPINNER_FRAMES.len()]
}

/// Truncate a string to at most `max` characters (Unicode-safe).
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn draw_sidebar(frame: &mut Frame, app: &UiApp, area: Rect) {
    let usage_height = if app.usage.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(usage_height)])
        .split(area);

    let list_area = chunks[0];
    let usage_area = chunks[1];

    let mut items: Vec<ListItem> = Vec::new();
    for (i, project) in app.projects.iter().enumerate() {
        let marker = if i == app.selected { ">> " } else { "   " };
        let name_style = if i == app.selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let mut spans = vec![
            Span::styled(marker, name_style),
            Span::styled(project.name.clone(), name_style),
        ];
        if app.generating.contains(&project.id) {
            spans.push(Span::styled(
                format!(" {}", spinner_frame(app.tick)),
                Style::default().fg(Color::Magenta),
            ));
        }
        items.push(ListItem::new(Line::from(spans)));
    }

    let border_style = if app.mode == Mode::Projects {
        Style::default().fg(Color::LightGreen)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let title = format!(" Projects ({}) ", app.projects.len());
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style),
    );

    let mut list_state = ratatui::widgets::ListState::default();
    if !app.projects.is_empty() {
        list_state.select(Some(app.selected));
    }
    frame.render_stateful_widget(list, list_area, &mut list_state);

    if let Some(usage) = &app.usage {
        let line = Line::from(vec![
            Span::styled(
                format!("{}", usage.remaining),
                Style::default().fg(Color::Green),
            ),
            Span::styled(format!("/{} credits", usage.points), Style::default()),
            Span::styled(
                format!("  resets {}", usage.resets_at.format("%b %d")),
                Style::default().add_modifier(Modifier::DIM),
            ),
        ]);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Usage ")
            .border_style(Style::default().fg(Color::Cyan));
        frame.render_widget(Paragraph::new(line).block(block), usage_area);
    }
}

fn draw_help_bar(frame: &mut Frame, app: &UiApp, area: Rect) {
    let help_text = match app.mode {
        Mode::Projects => "j/k: navigate  Enter: open  n: new  d: delete  Tab: view  q: quit",
        Mode::Chat => "j/k: messages  Enter: pick fragment  i: prompt  e: files  o: open url  y: copy url  Tab: view  Esc: back",
        Mode::Compose | Mode::NewProject => "Enter: send  Esc: cancel",
        Mode::Explorer => "j/k: navigate  Enter: open  h: collapse  c: copy file  J/K: scroll  Esc: back",
        Mode::ConfirmDelete => "y: confirm delete  Esc: cancel",
    };

    let notice = app
        .flash_message()
        .or(app.status_message.as_deref());
    let status = match notice {
        Some(msg) => format!(" {msg} | {help_text}"),
        None => format!(" {help_text}"),
    };

    let bar = Paragraph::new(Line::from(Span::styled(
        status,
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(bar, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn draw_new_project(frame: &mut Frame, app: &UiApp) {
    let width = frame.area().width.saturating_sub(10).clamp(20, 70);
    let input_rows = app.prompt.lines.len() as u16;
    let height = (input_rows + 3).min(frame.area().height);
    let area = centered_rect(width, height, frame.area());
    frame.render_widget(Clear, area);

    let counter = format!(
        " {}/{} ",
        app.prompt.char_count(),
        crate::backend::PROMPT_MAX_CHARS
    );
    let over_budget = app.prompt.char_count() > crate::backend::PROMPT_MAX_CHARS;
    let counter_style = if over_budget {
        Style::default().fg(Color::Red)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" What would you like to build? ")
        .title_bottom(Line::from(Span::styled(counter, counter_style)).right_aligned())
        .border_style(
            Style::default()
                .fg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines: Vec<Line> = app
        .prompt
        .lines
        .iter()
        .map(|l| Line::from(l.clone()))
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);

    let cursor_x = inner.x + app.prompt.cursor_col as u16;
    let cursor_y = inner.y + app.prompt.cursor_row as u16;
    if cursor_x < inner.x + inner.width && cursor_y < inner.y + inner.height {
        frame.set_cursor_position(ratatui::layout::Position::new(cursor_x, cursor_y));
    }
}

fn draw_confirm_delete(frame: &mut Frame, app: &UiApp) {
    let area = centered_rect(44, 5, frame.area());
    frame.render_widget(Clear, area);

    let name = app
        .selected_project()
        .map(|p| p.name.as_str())
        .unwrap_or("?");
    let text = format!(" Delete project '{name}'? (y/n)");
    let confirm = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Confirm Delete ")
            .border_style(Style::default().fg(Color::Red)),
    );
    frame.render_widget(confirm, area);
}
