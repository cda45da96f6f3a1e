use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
        KeyEventKind, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use loom::agent::{CodegenAgent, CommandAgent};
use loom::app::UiApp;
use loom::backend::{Backend, StateSnapshot};
use loom::event::{Event, EventHandler};
use loom::store::{self, ProjectStore};
use loom::ui;
use loom::usage::{CreditLedger, DEFAULT_POINTS};

const EVENT_TICK_RATE: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "loom", version, about = "Prompt-to-app chat workbench")]
struct Cli {
    /// Credits granted per 30-day window
    #[arg(long, default_value_t = DEFAULT_POINTS)]
    credits: u32,

    /// Agent command (reads a JSON request on stdin, prints a JSON outcome)
    #[arg(long)]
    agent_cmd: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a project from a prompt and run one generation
    New {
        /// The prompt describing what to build
        prompt: String,
    },
    /// List projects
    Ls,
    /// Delete a project by name
    Rm {
        /// Project name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let base_dir = store::default_base_dir();
    let project_store = ProjectStore::new(&base_dir);
    let ledger = CreditLedger::new(&base_dir, cli.credits);
    let agent: Arc<dyn CodegenAgent> = match &cli.agent_cmd {
        Some(cmd) => Arc::new(CommandAgent::new(cmd)),
        None => Arc::new(CommandAgent::from_env()),
    };

    match cli.command {
        Some(Commands::New { prompt }) => cmd_new(project_store, ledger, agent, &prompt).await,
        Some(Commands::Ls) => cmd_ls(project_store).await,
        Some(Commands::Rm { name }) => cmd_rm(project_store, &name).await,
        None => run_tui(project_store, ledger, agent).await,
    }
}

async fn cmd_new(
    store: ProjectStore,
    ledger: CreditLedger,
    agent: Arc<dyn CodegenAgent>,
    prompt: &str,
) -> Result<()> {
    anyhow::ensure!(!prompt.trim().is_empty(), "Message cannot be empty");
    ledger.consume().await.map_err(anyhow::Error::new)?;

    let (project, _first) = store.create_project(prompt).await?;
    println!("Created project: {}", project.name);

    let (log_tx, mut log_rx) = tokio::sync::mpsc::channel::<String>(64);
    let printer = tokio::spawn(async move {
        while let Some(line) = log_rx.recv().await {
            eprintln!("{line}");
        }
    });

    let messages = store.load_messages(&project.id).await;
    let request = loom::agent::GenerationRequest {
        prompt: prompt.trim().to_string(),
        history: loom::agent::history_from(&messages),
    };
    let result = agent.generate(request, log_tx).await;
    let _ = printer.await;

    match result {
        Ok(outcome) => {
            let fragment = loom::message::Fragment::new(
                outcome.title,
                outcome.sandbox_url.clone(),
                outcome.files,
            );
            store
                .append_message(
                    &project.id,
                    loom::message::Message::assistant_result(outcome.summary, fragment),
                )
                .await?;
            println!("Preview: {}", outcome.sandbox_url);
            Ok(())
        }
        Err(e) => {
            store
                .append_message(
                    &project.id,
                    loom::message::Message::assistant_error(
                        loom::agent::GENERATION_FAILED_MESSAGE,
                    ),
                )
                .await?;
            Err(e.context("Generation failed"))
        }
    }
}

async fn cmd_ls(store: ProjectStore) -> Result<()> {
    let projects = store.list_projects().await;
    if projects.is_empty() {
        println!("No projects yet.");
    } else {
        for p in &projects {
            println!("{}  {}", p.name, p.created_at.format("%Y-%m-%d %H:%M"));
        }
    }
    Ok(())
}

async fn cmd_rm(store: ProjectStore, name: &str) -> Result<()> {
    let projects = store.list_projects().await;
    let project = projects
        .iter()
        .find(|p| p.name == name)
        .with_context(|| format!("No project named '{name}'"))?;
    store.delete_project(&project.id).await?;
    println!("Deleted project: {name}");
    Ok(())
}

async fn run_tui(
    store: ProjectStore,
    ledger: CreditLedger,
    agent: Arc<dyn CodegenAgent>,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)?;

    // Set up channels between Backend and UiApp
    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel(64);
    let (state_tx, state_rx) = tokio::sync::watch::channel(Arc::new(StateSnapshot::default()));

    let backend = Backend::new(store, ledger, agent, state_tx);
    tokio::spawn(backend.run(cmd_rx));

    let mut app = UiApp::new(state_rx, cmd_tx);
    let mut events = EventHandler::new(EVENT_TICK_RATE);

    // Draw initial frame before entering event loop
    terminal.draw(|frame| ui::draw(frame, &app))?;

    // Main loop: no .await on I/O — the UI never blocks.
    loop {
        if app.should_quit {
            break;
        }

        match events.next().await {
            Some(Event::Key(key)) => {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
            Some(Event::Paste(text)) => {
                app.handle_paste(text);
            }
            Some(Event::Mouse(mouse)) => {
                if !matches!(mouse.kind, MouseEventKind::Moved) {
                    let size = terminal.size()?;
                    let frame_area = ratatui::layout::Rect::new(0, 0, size.width, size.height);
                    let layout = ui::compute_layout(frame_area);
                    app.handle_mouse(mouse, &layout);
                }
            }
            Some(Event::Tick) => {
                app.poll_state();
                app.on_tick();
            }
            Some(Event::Resize) => {
                app.needs_redraw = true;
            }
            None => break,
        }

        // Only redraw when state has actually changed
        if app.needs_redraw {
            terminal.draw(|frame| ui::draw(frame, &app))?;
            app.needs_redraw = false;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    Ok(())
}

#[cfg(test)]
mod cli_parse_tests {
    use super::*;

    #[test]
    fn parses_new_command() {
        let cli = Cli::parse_from(["loom", "new", "build a todo app"]);
        match cli.command {
            Some(Commands::New { prompt }) => assert_eq!(prompt, "build a todo app"),
            other => panic!("expected New, got {other:?}"),
        }
    }

    #[test]
    fn parses_ls_command() {
        let cli = Cli::parse_from(["loom", "ls"]);
        assert!(matches!(cli.command, Some(Commands::Ls)));
    }

    #[test]
    fn parses_rm_command() {
        let cli = Cli::parse_from(["loom", "rm", "amber-harbor"]);
        match cli.command {
            Some(Commands::Rm { name }) => assert_eq!(name, "amber-harbor"),
            other => panic!("expected Rm, got {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_launches_the_tui() {
        let cli = Cli::parse_from(["loom"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.credits, DEFAULT_POINTS);
    }

    #[test]
    fn credits_and_agent_cmd_flags_parse() {
        let cli = Cli::parse_from(["loom", "--credits", "3", "--agent-cmd", "my-agent", "ls"]);
        assert_eq!(cli.credits, 3);
        assert_eq!(cli.agent_cmd.as_deref(), Some("my-agent"));
    }

    #[test]
    fn default_agent_command_is_stable() {
        assert_eq!(loom::agent::DEFAULT_AGENT_COMMAND, "loom-agent");
    }
}
