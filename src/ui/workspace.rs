use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{Mode, UiApp, WorkspaceTab};
use crate::explorer::{breadcrumbs_for, Crumb, TreeRow};

/// Breadcrumb trails longer than this collapse to first + ellipsis + last.
/// Presentation only: the underlying crumb sequence is never mutated.
const MAX_VISIBLE_CRUMBS: usize = 4;

pub fn draw_workspace(frame: &mut Frame, app: &UiApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    draw_tabs(frame, app, chunks[0]);
    match app.tab {
        WorkspaceTab::Preview => draw_preview(frame, app, chunks[1]),
        WorkspaceTab::Code => draw_code(frame, app, chunks[1]),
    }
}

fn draw_tabs(frame: &mut Frame, app: &UiApp, area: Rect) {
    let active = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let inactive = Style::default().add_modifier(Modifier::DIM);
    let (demo_style, code_style) = match app.tab {
        WorkspaceTab::Preview => (active, inactive),
        WorkspaceTab::Code => (inactive, active),
    };
    let line = Line::from(vec![
        Span::styled(" [ Demo ]", demo_style),
        Span::styled(" [ Code ]", code_style),
        Span::styled("  Tab: switch", Style::default().add_modifier(Modifier::DIM)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_preview(frame: &mut Frame, app: &UiApp, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Preview ")
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // While the agent works, stream its output in place of the preview.
    if app.selected_is_generating() {
        if let Some(log) = app.selected_agent_log() {
            let text = ansi_to_tui::IntoText::into_text(&log).ok();
            let line_count = log.lines().count() as u16;
            let scroll_y = line_count.saturating_sub(inner.height);
            let paragraph = match text {
                Some(text) => Paragraph::new(text),
                None => Paragraph::new(log.to_string()),
            };
            frame.render_widget(paragraph.scroll((scroll_y, 0)), inner);
            return;
        }
    }

    let Some(fragment) = app.active_fragment.get() else {
        let placeholder = Paragraph::new(Span::styled(
            "No fragment yet. Send a prompt to generate one.",
            Style::default().add_modifier(Modifier::DIM),
        ));
        frame.render_widget(placeholder, inner);
        return;
    };

    let url_width = inner.width.saturating_sub(4) as usize;
    let lines = vec![
        Line::from(Span::styled(
            fragment.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("⌁ ", Style::default().fg(Color::Cyan)),
            Span::styled(
                super::truncate_chars(&fragment.sandbox_url, url_width),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!("{} generated file(s)", fragment.files.len()),
            Style::default().add_modifier(Modifier::DIM),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "o: open in browser   y: copy url",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_code(frame: &mut Frame, app: &UiApp, area: Rect) {
    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    draw_tree(frame, app, panels[0]);
    draw_file_view(frame, app, panels[1]);
}

fn draw_tree(frame: &mut Frame, app: &UiApp, area: Rect) {
    let border_style = if app.mode == Mode::Explorer {
        Style::default().fg(Color::LightGreen)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Files ")
        .border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = app.explorer.rows();
    if rows.is_empty() {
        let placeholder = Paragraph::new(Span::styled(
            "No files",
            Style::default().add_modifier(Modifier::DIM),
        ));
        frame.render_widget(placeholder, inner);
        return;
    }

    let lines = tree_lines(
        rows,
        app.explorer.cursor,
        app.explorer.selected(),
        app.mode == Mode::Explorer,
    );

    // Keep the cursor row visible.
    let height = inner.height as usize;
    let scroll_y = if app.explorer.cursor >= height {
        (app.explorer.cursor + 1 - height) as u16
    } else {
        0
    };
    frame.render_widget(Paragraph::new(lines).scroll((scroll_y, 0)), inner);
}

/// Render flattened tree rows with fold markers and selection highlights.
pub fn tree_lines(
    rows: &[TreeRow],
    cursor: usize,
    selected: Option<&str>,
    cursor_active: bool,
) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let indent = "  ".repeat(row.depth);
        let glyph = if row.is_folder {
            if row.collapsed {
                "▸ "
            } else {
                "▾ "
            }
        } else {
            "  "
        };
        let marker = if cursor_active && i == cursor { ">" } else { " " };

        let mut style = Style::default();
        if row.is_folder {
            style = style.add_modifier(Modifier::BOLD);
        }
        if selected.is_some_and(|s| s == row.path) {
            style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
        }
        if cursor_active && i == cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }

        lines.push(Line::from(vec![
            Span::raw(format!("{marker}{indent}")),
            Span::styled(format!("{glyph}{}", row.name), style),
        ]));
    }
    lines
}

fn draw_file_view(frame: &mut Frame, app: &UiApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let crumb_text = match app.explorer.selected() {
        Some(path) => format_breadcrumbs(&breadcrumbs_for(path)),
        None => String::new(),
    };
    frame.render_widget(
        Paragraph::new(Span::styled(
            format!(" {crumb_text}"),
            Style::default().add_modifier(Modifier::DIM),
        )),
        chunks[0],
    );

    let title = match app.explorer.selected() {
        Some(path) => {
            let name = path.rsplit('/').next().unwrap_or(path);
            format!(" {name} ")
        }
        None => " File ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(chunks[1]);
    frame.render_widget(block, chunks[1]);

    let content = app
        .explorer
        .selected()
        .and_then(|path| app.active_fragment.get().and_then(|f| f.files.get(path)))
        .cloned();
    match content {
        Some(content) => {
            let total = content.lines().count() as u16;
            let max_scroll = total.saturating_sub(inner.height);
            let scroll_y = app.file_scroll.min(max_scroll);
            frame.render_widget(
                Paragraph::new(content).scroll((scroll_y, 0)),
                inner,
            );
        }
        None => {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "Select a file to view its contents",
                    Style::default().add_modifier(Modifier::DIM),
                )),
                inner,
            );
        }
    }
}

/// Join a breadcrumb trail for display, collapsing long trails to
/// `first > … > last`.
pub fn format_breadcrumbs(crumbs: &[Crumb]) -> String {
    if crumbs.len() <= MAX_VISIBLE_CRUMBS {
        return crumbs
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
    }
    let first = &crumbs[0];
    let last = &crumbs[crumbs.len() - 1];
    format!("{} > … > {}", first.name, last.name)
}
