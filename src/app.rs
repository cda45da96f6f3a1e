use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::backend::{BackendCommand, StateSnapshot};
use crate::explorer::ExplorerState;
use crate::message::Message;
use crate::project::{Project, ProjectId};
use crate::reconcile::ActiveFragment;
use crate::ui::state::{PromptState, ScrollState};
use crate::ui::UiLayout;
use crate::usage::CreditStatus;

/// How long a transient clipboard/browser notice stays in the help bar,
/// in ticks (50 ms each).
const FLASH_TICKS: u64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Projects,
    Chat,
    Compose,
    NewProject,
    Explorer,
    ConfirmDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceTab {
    Preview,
    Code,
}

/// UI-only application state, separated from I/O.
/// Receives state snapshots from the Backend actor via channels.
pub struct UiApp {
    // Snapshot-derived fields (updated via poll_state)
    pub projects: Vec<Project>,
    pub messages: HashMap<ProjectId, Vec<Message>>,
    pub generating: HashSet<ProjectId>,
    pub agent_logs: HashMap<ProjectId, String>,
    pub usage: Option<CreditStatus>,
    pub status_message: Option<String>,

    // Local UI state
    pub selected: usize,
    pub mode: Mode,
    pub tab: WorkspaceTab,
    pub message_cursor: usize,
    pub chat_scroll: ScrollState,
    pub file_scroll: u16,
    pub prompt: PromptState,
    pub active_fragment: ActiveFragment,
    pub explorer: ExplorerState,
    pub should_quit: bool,
    pub needs_redraw: bool,
    pub tick: u64,
    flash: Option<(String, u64)>,
    message_counts: HashMap<ProjectId, usize>,

    // Channels
    cmd_tx: tokio::sync::mpsc::Sender<BackendCommand>,
    state_rx: tokio::sync::watch::Receiver<Arc<StateSnapshot>>,
}

impl UiApp {
    pub fn new(
        state_rx: tokio::sync::watch::Receiver<Arc<StateSnapshot>>,
        cmd_tx: tokio::sync::mpsc::Sender<BackendCommand>,
    ) -> Self {
        Self {
            projects: Vec::new(),
            messages: HashMap::new(),
            generating: HashSet::new(),
            agent_logs: HashMap::new(),
            usage: None,
            status_message: None,
            selected: 0,
            mode: Mode::Projects,
            tab: WorkspaceTab::Preview,
            message_cursor: 0,
            chat_scroll: ScrollState::default(),
            file_scroll: 0,
            prompt: PromptState::new(),
            active_fragment: ActiveFragment::new(),
            explorer: ExplorerState::new(),
            should_quit: false,
            needs_redraw: true,
            tick: 0,
            flash: None,
            message_counts: HashMap::new(),
            cmd_tx,
            state_rx,
        }
    }

    /// Test constructor with dummy channels.
    #[cfg(test)]
    pub fn new_test() -> Self {
        let (cmd_tx, _cmd_rx) = tokio::sync::mpsc::channel(1);
        let (_state_tx, state_rx) =
            tokio::sync::watch::channel(Arc::new(StateSnapshot::default()));
        Self::new(state_rx, cmd_tx)
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.projects.get(self.selected)
    }

    pub fn selected_messages(&self) -> &[Message] {
        self.selected_project()
            .and_then(|p| self.messages.get(&p.id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn selected_is_generating(&self) -> bool {
        self.selected_project()
            .is_some_and(|p| self.generating.contains(&p.id))
    }

    pub fn selected_agent_log(&self) -> Option<&str> {
        self.selected_project()
            .and_then(|p| self.agent_logs.get(&p.id))
            .map(String::as_str)
    }

    /// The transient notice, if any, shown in place of the status message.
    pub fn flash_message(&self) -> Option<&str> {
        self.flash.as_ref().map(|(text, _)| text.as_str())
    }

    // ── Snapshot intake ─────────────────────────────────────────────

    /// Poll for new state from the backend. Call once per tick.
    pub fn poll_state(&mut self) {
        if self.state_rx.has_changed().unwrap_or(false) {
            let snapshot = self.state_rx.borrow_and_update().clone();
            self.apply_snapshot(&snapshot);
            self.needs_redraw = true;
        }
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: &StateSnapshot) {
        self.projects = snapshot.projects.clone();
        self.messages = snapshot.messages.clone();
        self.generating = snapshot.generating.clone();
        self.agent_logs = snapshot.agent_logs.clone();
        self.usage = snapshot.usage;
        self.status_message = snapshot.status_message.clone();

        if self.projects.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.projects.len() {
            self.selected = self.projects.len() - 1;
        }

        let live: HashSet<ProjectId> = self.projects.iter().map(|p| p.id).collect();
        self.message_counts.retain(|id, _| live.contains(id));

        self.sync_selected_project();
    }

    /// Reconcile the active fragment and pin the chat to new arrivals for
    /// the currently selected project.
    fn sync_selected_project(&mut self) {
        let Some(project) = self.projects.get(self.selected) else {
            return;
        };
        let id = project.id;
        let messages = self
            .messages
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if self.active_fragment.observe(messages) {
            match self.active_fragment.get() {
                Some(fragment) => {
                    let files = fragment.files.clone();
                    self.explorer.set_files(&files);
                }
                None => self.explorer.clear(),
            }
            self.file_scroll = 0;
        }

        let count = messages.len();
        let previous = self.message_counts.insert(id, count);
        if previous != Some(count) {
            self.message_cursor = count.saturating_sub(1);
            self.chat_scroll.to_bottom();
        }
    }

    // ── Command queueing ────────────────────────────────────────────

    fn queue_command(&mut self, command: BackendCommand) {
        match self.cmd_tx.try_send(command) {
            Ok(()) => {}
            Err(tokio::sync::mpsc::error::TrySendError::Full(command)) => {
                let tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(command).await;
                });
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                self.status_message = Some("Backend disconnected".to_string());
                self.should_quit = true;
            }
        }
    }

    // ── Key handling ────────────────────────────────────────────────

    /// Handle a key event. Synchronous — sends BackendCommand for I/O.
    pub fn handle_key(&mut self, key: KeyEvent) {
        self.needs_redraw = true;
        match self.mode {
            Mode::Projects => self.handle_projects_key(key),
            Mode::Chat => self.handle_chat_key(key),
            Mode::Compose | Mode::NewProject => self.handle_prompt_key(key),
            Mode::Explorer => self.handle_explorer_key(key.code),
            Mode::ConfirmDelete => self.handle_confirm_delete_key(key.code),
        }
    }

    pub fn handle_paste(&mut self, text: String) {
        if matches!(self.mode, Mode::Compose | Mode::NewProject) {
            self.prompt.insert_text(&text);
            self.needs_redraw = true;
        }
    }

    fn handle_projects_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.queue_command(BackendCommand::Quit);
                self.should_quit = true;
            }
            KeyCode::Char('j') | KeyCode::Down => self.select_next_project(),
            KeyCode::Char('k') | KeyCode::Up => self.select_prev_project(),
            KeyCode::Enter | KeyCode::Char('l') => {
                if !self.projects.is_empty() {
                    self.mode = Mode::Chat;
                }
            }
            KeyCode::Char('n') => self.start_new_project(),
            KeyCode::Char('d') => {
                if !self.projects.is_empty() {
                    self.mode = Mode::ConfirmDelete;
                    self.status_message = None;
                }
            }
            KeyCode::Tab => self.toggle_tab(),
            _ => {}
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.mode = Mode::Projects,
            KeyCode::Char('q') => {
                self.queue_command(BackendCommand::Quit);
                self.should_quit = true;
            }
            KeyCode::Char('i') => self.enter_compose(),
            KeyCode::Char('j') | KeyCode::Down => {
                let count = self.selected_messages().len();
                if self.message_cursor + 1 < count {
                    self.message_cursor += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.message_cursor = self.message_cursor.saturating_sub(1);
            }
            KeyCode::Enter => self.activate_cursor_fragment(),
            KeyCode::PageUp => self.chat_scroll.page_up(),
            KeyCode::PageDown => self.chat_scroll.page_down(),
            KeyCode::Char('e') => self.enter_explorer(),
            KeyCode::Char('o') => self.open_sandbox_url(),
            KeyCode::Char('y') => self.copy_sandbox_url(),
            KeyCode::Tab => self.toggle_tab(),
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.cancel_prompt(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cancel_prompt();
            }
            KeyCode::Enter => self.submit_prompt(),
            KeyCode::Backspace => self.prompt.backspace(),
            KeyCode::Left => self.prompt.move_left(),
            KeyCode::Right => self.prompt.move_right(),
            KeyCode::Up => self.prompt.move_up(),
            KeyCode::Down => self.prompt.move_down(),
            KeyCode::Home => self.prompt.move_home(),
            KeyCode::End => self.prompt.move_end(),
            KeyCode::Char(ch) => self.prompt.insert_char(ch),
            _ => {}
        }
    }

    fn handle_explorer_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.mode = Mode::Chat,
            KeyCode::Char('j') | KeyCode::Down => {
                self.explorer.move_cursor_down();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.explorer.move_cursor_up();
            }
            KeyCode::Enter | KeyCode::Char('l') => {
                let files = self
                    .active_fragment
                    .get()
                    .map(|f| f.files.clone())
                    .unwrap_or_default();
                self.explorer.activate_cursor(&files);
                self.file_scroll = 0;
            }
            KeyCode::Char('h') => self.explorer.collapse_cursor(),
            KeyCode::Char('c') => self.copy_selected_file(),
            KeyCode::Char('J') | KeyCode::PageDown => {
                self.file_scroll = self.file_scroll.saturating_add(15);
            }
            KeyCode::Char('K') | KeyCode::PageUp => {
                self.file_scroll = self.file_scroll.saturating_sub(15);
            }
            KeyCode::Tab => self.toggle_tab(),
            _ => {}
        }
    }

    fn handle_confirm_delete_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('y') => {
                if let Some(project) = self.projects.get(self.selected) {
                    let project_id = project.id;
                    let name = project.name.clone();
                    self.queue_command(BackendCommand::DeleteProject { project_id, name });
                }
                self.mode = Mode::Projects;
                if self.selected > 0 && self.selected >= self.projects.len().saturating_sub(1) {
                    self.selected = self.projects.len().saturating_sub(2);
                }
            }
            KeyCode::Esc | KeyCode::Char('n') => self.mode = Mode::Projects,
            _ => {}
        }
    }

    // ── Actions ─────────────────────────────────────────────────────

    pub fn select_next_project(&mut self) {
        if !self.projects.is_empty() {
            self.selected = (self.selected + 1) % self.projects.len();
            self.reset_project_view();
        }
    }

    pub fn select_prev_project(&mut self) {
        if !self.projects.is_empty() {
            self.selected = if self.selected == 0 {
                self.projects.len() - 1
            } else {
                self.selected - 1
            };
            self.reset_project_view();
        }
    }

    fn select_project_index(&mut self, idx: usize) {
        if idx < self.projects.len() && idx != self.selected {
            self.selected = idx;
            self.reset_project_view();
        }
    }

    /// Switching projects is a view unmount: the active fragment resets and
    /// the next snapshot reconciles from scratch.
    fn reset_project_view(&mut self) {
        self.active_fragment.reset();
        self.explorer.clear();
        self.file_scroll = 0;
        self.chat_scroll.to_bottom();
        if let Some(project) = self.projects.get(self.selected) {
            self.message_counts.remove(&project.id);
        }
        self.sync_selected_project();
    }

    pub fn enter_compose(&mut self) {
        if !self.projects.is_empty() {
            self.prompt.reset();
            self.mode = Mode::Compose;
        }
    }

    pub fn start_new_project(&mut self) {
        self.prompt.reset();
        self.mode = Mode::NewProject;
        self.status_message = None;
    }

    fn cancel_prompt(&mut self) {
        let back = if self.mode == Mode::NewProject {
            Mode::Projects
        } else {
            Mode::Chat
        };
        self.prompt.reset();
        self.mode = back;
    }

    fn submit_prompt(&mut self) {
        if self.prompt.is_blank() {
            self.cancel_prompt();
            return;
        }
        let text = self.prompt.text();
        match self.mode {
            Mode::NewProject => {
                self.queue_command(BackendCommand::CreateProject { prompt: text });
                // The new project lands at the top of the newest-first list.
                self.selected = 0;
                self.reset_project_view();
                self.mode = Mode::Chat;
            }
            _ => {
                if let Some(project) = self.projects.get(self.selected) {
                    self.queue_command(BackendCommand::SubmitPrompt {
                        project_id: project.id,
                        text,
                    });
                }
                self.mode = Mode::Chat;
            }
        }
        self.prompt.reset();
    }

    /// Manual fragment selection: activate the fragment card under the
    /// message cursor, if that message carries one.
    fn activate_cursor_fragment(&mut self) {
        let Some(message) = self.selected_messages().get(self.message_cursor) else {
            return;
        };
        if !message.has_fragment() {
            return;
        }
        let Some(fragment) = message.fragment.clone() else {
            return;
        };
        let files = fragment.files.clone();
        self.active_fragment.select(fragment);
        self.explorer.set_files(&files);
        self.file_scroll = 0;
    }

    fn enter_explorer(&mut self) {
        if self.active_fragment.get().is_some() {
            self.tab = WorkspaceTab::Code;
            self.mode = Mode::Explorer;
        }
    }

    pub fn toggle_tab(&mut self) {
        self.tab = match self.tab {
            WorkspaceTab::Preview => WorkspaceTab::Code,
            WorkspaceTab::Code => WorkspaceTab::Preview,
        };
        if self.tab == WorkspaceTab::Preview && self.mode == Mode::Explorer {
            self.mode = Mode::Chat;
        }
    }

    // ── Clipboard and browser (fire-and-forget) ─────────────────────

    fn copy_selected_file(&mut self) {
        let Some(path) = self.explorer.selected().map(str::to_string) else {
            self.set_flash("No file selected");
            return;
        };
        let content = self
            .active_fragment
            .get()
            .and_then(|f| f.files.get(&path))
            .cloned();
        let Some(content) = content else {
            self.set_flash("No file selected");
            return;
        };
        self.copy_to_clipboard(&content, "Copied file contents");
    }

    fn copy_sandbox_url(&mut self) {
        let Some(url) = self.active_fragment.get().map(|f| f.sandbox_url.clone()) else {
            self.set_flash("No fragment selected");
            return;
        };
        self.copy_to_clipboard(&url, "Copied sandbox URL");
    }

    fn copy_to_clipboard(&mut self, text: &str, success: &str) {
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_text(text.to_string()) {
                Ok(()) => self.set_flash(success),
                Err(e) => self.set_flash(&format!("Clipboard error: {e}")),
            },
            Err(e) => self.set_flash(&format!("Clipboard not available: {e}")),
        }
    }

    fn open_sandbox_url(&mut self) {
        let Some(url) = self.active_fragment.get().map(|f| f.sandbox_url.clone()) else {
            self.set_flash("No fragment selected");
            return;
        };
        match open::that(&url) {
            Ok(()) => self.set_flash("Opened in browser"),
            Err(e) => self.set_flash(&format!("Failed to open browser: {e}")),
        }
    }

    fn set_flash(&mut self, text: &str) {
        self.flash = Some((text.to_string(), self.tick + FLASH_TICKS));
    }

    // ── Ticks ───────────────────────────────────────────────────────

    pub fn on_tick(&mut self) {
        self.tick += 1;
        if self
            .flash
            .as_ref()
            .is_some_and(|(_, expires)| self.tick >= *expires)
        {
            self.flash = None;
            self.needs_redraw = true;
        }
        // The shimmer and spinner animate while the agent works.
        let awaiting = crate::reconcile::is_awaiting_response(self.selected_messages())
            || self.selected_is_generating();
        if awaiting && self.tick % 4 == 0 {
            self.needs_redraw = true;
        }
    }

    // ── Mouse handling ──────────────────────────────────────────────

    /// Handle mouse events. Synchronous.
    pub fn handle_mouse(&mut self, mouse: MouseEvent, layout: &UiLayout) {
        self.needs_redraw = true;
        let pos = Position::new(mouse.column, mouse.row);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if layout.sidebar.contains(pos) {
                    let inner_y = layout.sidebar.y.saturating_add(1);
                    if mouse.row >= inner_y {
                        let idx = (mouse.row - inner_y) as usize;
                        self.select_project_index(idx);
                        if self.mode != Mode::Projects
                            && !matches!(self.mode, Mode::Compose | Mode::NewProject)
                        {
                            self.mode = Mode::Projects;
                        }
                    }
                } else if layout.chat.contains(pos) && self.mode == Mode::Projects {
                    if !self.projects.is_empty() {
                        self.mode = Mode::Chat;
                    }
                } else if layout.workspace.contains(pos)
                    && self.tab == WorkspaceTab::Code
                    && matches!(self.mode, Mode::Projects | Mode::Chat)
                {
                    self.enter_explorer();
                }
            }
            MouseEventKind::ScrollUp => {
                if layout.chat.contains(pos) {
                    self.chat_scroll.scroll_up();
                } else if layout.workspace.contains(pos) {
                    self.file_scroll = self.file_scroll.saturating_sub(3);
                } else if layout.sidebar.contains(pos) {
                    self.select_prev_project();
                }
            }
            MouseEventKind::ScrollDown => {
                if layout.chat.contains(pos) {
                    self.chat_scroll.scroll_down();
                } else if layout.workspace.contains(pos) {
                    self.file_scroll = self.file_scroll.saturating_add(3);
                } else if layout.sidebar.contains(pos) {
                    self.select_next_project();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FileCollection, Fragment};

    fn make_app() -> (UiApp, tokio::sync::mpsc::Receiver<BackendCommand>) {
        let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel(8);
        let (_state_tx, state_rx) =
            tokio::sync::watch::channel(Arc::new(StateSnapshot::default()));
        (UiApp::new(state_rx, cmd_tx), cmd_rx)
    }

    fn fragment(title: &str) -> Fragment {
        let mut files = FileCollection::new();
        files.insert("app/page.tsx".to_string(), "export default 1".to_string());
        files.insert("app/layout.tsx".to_string(), "layout".to_string());
        Fragment::new(title, "https://3000-sbx.example.dev", files)
    }

    fn snapshot_with_conversation(titles: &[&str]) -> (StateSnapshot, ProjectId) {
        let project = Project::new("amber-harbor");
        let id = project.id;
        let mut messages = vec![Message::user("build it")];
        for title in titles {
            messages.push(Message::assistant_result("Here you go", fragment(title)));
        }
        let mut snapshot = StateSnapshot {
            projects: vec![project],
            ..StateSnapshot::default()
        };
        snapshot.messages.insert(id, messages);
        (snapshot, id)
    }

    #[test]
    fn snapshot_reconciles_active_fragment_and_explorer() {
        let (mut app, _rx) = make_app();
        let (snapshot, _id) = snapshot_with_conversation(&["Todo app"]);
        app.apply_snapshot(&snapshot);

        assert_eq!(app.active_fragment.get().unwrap().title, "Todo app");
        assert_eq!(app.explorer.selected(), Some("app/page.tsx"));
        assert_eq!(app.message_cursor, 1);
    }

    #[test]
    fn repeated_identical_snapshot_keeps_manual_selection() {
        let (mut app, _rx) = make_app();
        let (snapshot, id) = snapshot_with_conversation(&["old", "new"]);
        app.apply_snapshot(&snapshot);
        assert_eq!(app.active_fragment.get().unwrap().title, "new");

        // User clicks the older fragment card.
        app.message_cursor = 1;
        app.activate_cursor_fragment();
        assert_eq!(app.active_fragment.get().unwrap().title, "old");

        // The 500 ms poller redelivers the same history.
        let mut same = snapshot.clone();
        same.messages.insert(id, snapshot.messages[&id].clone());
        app.apply_snapshot(&same);
        assert_eq!(app.active_fragment.get().unwrap().title, "old");
    }

    #[test]
    fn new_fragment_arrival_overrides_manual_selection() {
        let (mut app, _rx) = make_app();
        let (snapshot, id) = snapshot_with_conversation(&["old"]);
        app.apply_snapshot(&snapshot);

        app.message_cursor = 1;
        app.activate_cursor_fragment();

        let mut next = snapshot.clone();
        next.messages
            .get_mut(&id)
            .unwrap()
            .push(Message::assistant_result("done", fragment("brand new")));
        app.apply_snapshot(&next);
        assert_eq!(app.active_fragment.get().unwrap().title, "brand new");
        // New arrival pins the cursor and the scroll to the bottom.
        assert_eq!(app.message_cursor, 2);
        assert_eq!(app.chat_scroll.offset, 0);
    }

    #[test]
    fn switching_projects_resets_the_fragment_view() {
        let (mut app, _rx) = make_app();
        let (mut snapshot, id_a) = snapshot_with_conversation(&["from a"]);
        let project_b = Project::new("bold-beacon");
        let id_b = project_b.id;
        snapshot.projects.push(project_b);
        snapshot.messages.insert(id_b, vec![Message::user("still working")]);
        app.apply_snapshot(&snapshot);
        assert_eq!(app.active_fragment.get().unwrap().title, "from a");

        app.select_next_project();
        assert_eq!(app.selected_project().unwrap().id, id_b);
        assert!(app.active_fragment.get().is_none());
        assert!(app.explorer.selected().is_none());

        // And switching back re-reconciles project A from scratch.
        app.select_prev_project();
        assert_eq!(app.selected_project().unwrap().id, id_a);
        assert_eq!(app.active_fragment.get().unwrap().title, "from a");
    }

    #[test]
    fn compose_enter_sends_submit_prompt() {
        let (mut app, mut cmd_rx) = make_app();
        let (snapshot, id) = snapshot_with_conversation(&[]);
        app.apply_snapshot(&snapshot);
        app.mode = Mode::Chat;

        app.handle_key(KeyEvent::new(KeyCode::Char('i'), KeyModifiers::NONE));
        assert_eq!(app.mode, Mode::Compose);
        for ch in "add auth".chars() {
            app.handle_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE));
        }
        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));

        assert_eq!(app.mode, Mode::Chat);
        match cmd_rx.try_recv() {
            Ok(BackendCommand::SubmitPrompt { project_id, text }) => {
                assert_eq!(project_id, id);
                assert_eq!(text, "add auth");
            }
            other => panic!("expected SubmitPrompt, got {other:?}"),
        }
    }

    #[test]
    fn blank_compose_submit_sends_nothing() {
        let (mut app, mut cmd_rx) = make_app();
        let (snapshot, _id) = snapshot_with_conversation(&[]);
        app.apply_snapshot(&snapshot);
        app.mode = Mode::Chat;
        app.enter_compose();
        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(app.mode, Mode::Chat);
        assert!(cmd_rx.try_recv().is_err());
    }

    #[test]
    fn new_project_flow_sends_create_project() {
        let (mut app, mut cmd_rx) = make_app();
        app.handle_key(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::NONE));
        assert_eq!(app.mode, Mode::NewProject);
        for ch in "a landing page".chars() {
            app.handle_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE));
        }
        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));

        match cmd_rx.try_recv() {
            Ok(BackendCommand::CreateProject { prompt }) => {
                assert_eq!(prompt, "a landing page");
            }
            other => panic!("expected CreateProject, got {other:?}"),
        }
    }

    #[test]
    fn confirm_delete_sends_delete_project() {
        let (mut app, mut cmd_rx) = make_app();
        let (snapshot, id) = snapshot_with_conversation(&[]);
        let name = snapshot.projects[0].name.clone();
        app.apply_snapshot(&snapshot);

        app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE));
        assert_eq!(app.mode, Mode::ConfirmDelete);
        app.handle_key(KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE));

        match cmd_rx.try_recv() {
            Ok(BackendCommand::DeleteProject { project_id, name: n }) => {
                assert_eq!(project_id, id);
                assert_eq!(n, name);
            }
            other => panic!("expected DeleteProject, got {other:?}"),
        }
    }

    #[test]
    fn escape_cancels_delete_confirmation() {
        let (mut app, mut cmd_rx) = make_app();
        let (snapshot, _id) = snapshot_with_conversation(&[]);
        app.apply_snapshot(&snapshot);
        app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE));
        app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(app.mode, Mode::Projects);
        assert!(cmd_rx.try_recv().is_err());
    }

    #[test]
    fn explorer_mode_requires_an_active_fragment() {
        let (mut app, _rx) = make_app();
        let (snapshot, _id) = snapshot_with_conversation(&[]);
        app.apply_snapshot(&snapshot);
        app.mode = Mode::Chat;
        app.handle_key(KeyEvent::new(KeyCode::Char('e'), KeyModifiers::NONE));
        assert_eq!(app.mode, Mode::Chat);
        assert_eq!(app.tab, WorkspaceTab::Preview);
    }

    #[test]
    fn explorer_navigation_selects_files() {
        let (mut app, _rx) = make_app();
        let (snapshot, _id) = snapshot_with_conversation(&["app"]);
        app.apply_snapshot(&snapshot);
        app.mode = Mode::Chat;
        app.handle_key(KeyEvent::new(KeyCode::Char('e'), KeyModifiers::NONE));
        assert_eq!(app.mode, Mode::Explorer);
        assert_eq!(app.tab, WorkspaceTab::Code);

        // Rows: "app" folder, then its two files.
        app.handle_key(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE));
        app.handle_key(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE));
        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(app.explorer.selected(), Some("app/layout.tsx"));
    }

    #[test]
    fn tab_toggles_workspace_tab() {
        let (mut app, _rx) = make_app();
        assert_eq!(app.tab, WorkspaceTab::Preview);
        app.toggle_tab();
        assert_eq!(app.tab, WorkspaceTab::Code);
        app.toggle_tab();
        assert_eq!(app.tab, WorkspaceTab::Preview);
    }

    #[test]
    fn flash_expires_after_its_window() {
        let (mut app, _rx) = make_app();
        app.set_flash("Copied sandbox URL");
        assert_eq!(app.flash_message(), Some("Copied sandbox URL"));
        for _ in 0..FLASH_TICKS {
            app.on_tick();
        }
        assert!(app.flash_message().is_none());
    }

    #[test]
    fn delete_clamps_selection_to_remaining_projects() {
        let (mut app, _rx) = make_app();
        let (mut snapshot, _id) = snapshot_with_conversation(&[]);
        snapshot.projects.push(Project::new("second"));
        app.apply_snapshot(&snapshot);
        app.selected = 1;
        app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE));
        app.handle_key(KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE));
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn awaiting_response_is_reported_for_user_tail() {
        let (mut app, _rx) = make_app();
        let (snapshot, _id) = snapshot_with_conversation(&[]);
        app.apply_snapshot(&snapshot);
        assert!(crate::reconcile::is_awaiting_response(
            app.selected_messages()
        ));
    }
}
