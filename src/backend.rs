use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};

use crate::agent::{
    self, CodegenAgent, GenerationOutcome, GenerationRequest, GENERATION_FAILED_MESSAGE,
};
use crate::message::{Fragment, Message};
use crate::project::{Project, ProjectId};
use crate::store::ProjectStore;
use crate::usage::{CreditError, CreditLedger, CreditStatus};

/// How often the store is re-read while the TUI runs.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Longest prompt the backend accepts, in characters.
pub const PROMPT_MAX_CHARS: usize = 1000;

/// Command from UI → Backend.
#[derive(Debug)]
pub enum BackendCommand {
    CreateProject { prompt: String },
    SubmitPrompt { project_id: ProjectId, text: String },
    DeleteProject { project_id: ProjectId, name: String },
    Quit,
}

/// Snapshot of backend state sent to UI for rendering.
/// Uses latest-value semantics via `watch` channel.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub projects: Vec<Project>,
    pub messages: HashMap<ProjectId, Vec<Message>>,
    /// Projects with a generation in flight.
    pub generating: HashSet<ProjectId>,
    /// Accumulated live agent output per generating project.
    pub agent_logs: HashMap<ProjectId, String>,
    pub usage: Option<CreditStatus>,
    pub status_message: Option<String>,
}

/// Event from a spawned generation task back to the actor.
#[derive(Debug)]
enum AgentEvent {
    Log {
        project_id: ProjectId,
        line: String,
    },
    Finished {
        project_id: ProjectId,
        result: Result<GenerationOutcome>,
    },
}

/// The backend actor runs in `tokio::spawn` and owns all I/O state: the
/// project store, the credit ledger, and in-flight generation tasks. It
/// processes commands from the UI, forwards agent progress, and polls the
/// store on a fixed interval.
pub struct Backend {
    store: ProjectStore,
    ledger: CreditLedger,
    agent: Arc<dyn CodegenAgent>,

    // Store-derived state
    projects: Vec<Project>,
    messages: HashMap<ProjectId, Vec<Message>>,

    // Generation state
    generating: HashSet<ProjectId>,
    agent_logs: HashMap<ProjectId, String>,

    usage: Option<CreditStatus>,
    status_message: Option<String>,

    // Channels
    state_tx: watch::Sender<Arc<StateSnapshot>>,
    agent_tx: mpsc::Sender<AgentEvent>,
    agent_rx: Option<mpsc::Receiver<AgentEvent>>,
}

impl Backend {
    pub fn new(
        store: ProjectStore,
        ledger: CreditLedger,
        agent: Arc<dyn CodegenAgent>,
        state_tx: watch::Sender<Arc<StateSnapshot>>,
    ) -> Self {
        let (agent_tx, agent_rx) = mpsc::channel(64);
        Self {
            store,
            ledger,
            agent,
            projects: Vec::new(),
            messages: HashMap::new(),
            generating: HashSet::new(),
            agent_logs: HashMap::new(),
            usage: None,
            status_message: None,
            state_tx,
            agent_tx,
            agent_rx: Some(agent_rx),
        }
    }

    /// Run the backend event loop.
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<BackendCommand>) {
        let Some(mut agent_rx) = self.agent_rx.take() else {
            return;
        };

        self.refresh().await;
        self.send_snapshot();

        let mut poll = tokio::time::interval(POLL_INTERVAL);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    if self.handle_command(cmd).await {
                        break; // Quit received
                    }
                    self.send_snapshot();
                }
                Some(event) = agent_rx.recv() => {
                    self.handle_agent_event(event).await;
                    self.send_snapshot();
                }
                _ = poll.tick() => {
                    self.refresh().await;
                    self.send_snapshot();
                }
            }
        }
    }

    /// Handle a command from the UI. Returns true if the backend should stop.
    async fn handle_command(&mut self, cmd: BackendCommand) -> bool {
        match cmd {
            BackendCommand::Quit => return true,
            BackendCommand::CreateProject { prompt } => {
                self.create_project(prompt).await;
            }
            BackendCommand::SubmitPrompt { project_id, text } => {
                self.submit_prompt(project_id, text).await;
            }
            BackendCommand::DeleteProject { project_id, name } => {
                self.delete_project(project_id, &name).await;
            }
        }
        false
    }

    async fn create_project(&mut self, prompt: String) {
        let Some(prompt) = self.accept_prompt(&prompt).await else {
            return;
        };
        match self.store.create_project(&prompt).await {
            Ok((project, _first)) => {
                self.status_message = Some(format!("Created project '{}'", project.name));
                self.refresh().await;
                self.spawn_generation(project.id, prompt).await;
            }
            Err(e) => {
                self.status_message = Some(format!("Failed to create project: {e}"));
            }
        }
    }

    async fn submit_prompt(&mut self, project_id: ProjectId, text: String) {
        if self.generating.contains(&project_id) {
            self.status_message = Some("Agent is already working on this project".to_string());
            return;
        }
        let Some(prompt) = self.accept_prompt(&text).await else {
            return;
        };
        if let Err(e) = self
            .store
            .append_message(&project_id, Message::user(&prompt))
            .await
        {
            self.status_message = Some(format!("Failed to save message: {e}"));
            return;
        }
        self.refresh().await;
        self.spawn_generation(project_id, prompt).await;
    }

    /// Validate a prompt and consume one credit. Returns the trimmed prompt
    /// on success; on any failure the status message explains why.
    async fn accept_prompt(&mut self, text: &str) -> Option<String> {
        let prompt = text.trim();
        if prompt.is_empty() {
            self.status_message = Some("Message cannot be empty".to_string());
            return None;
        }
        if prompt.chars().count() > PROMPT_MAX_CHARS {
            self.status_message = Some("Prompt is too long".to_string());
            return None;
        }
        match self.ledger.consume().await {
            Ok(status) => {
                self.usage = Some(status);
                Some(prompt.to_string())
            }
            Err(CreditError::Exhausted { .. }) => {
                self.status_message = Some("You have run out of credits".to_string());
                None
            }
            Err(CreditError::Storage(e)) => {
                self.status_message = Some(format!("Credit ledger error: {e}"));
                None
            }
        }
    }

    async fn delete_project(&mut self, project_id: ProjectId, name: &str) {
        match self.store.delete_project(&project_id).await {
            Ok(()) => {
                self.status_message = Some(format!("Deleted project '{name}'"));
            }
            Err(e) => {
                self.status_message = Some(format!("Failed to delete project: {e}"));
            }
        }
        self.generating.remove(&project_id);
        self.agent_logs.remove(&project_id);
        self.refresh().await;
    }

    /// Launch one generation task for a project. The task streams progress
    /// lines and reports completion through the agent event channel.
    async fn spawn_generation(&mut self, project_id: ProjectId, prompt: String) {
        self.generating.insert(project_id);
        self.agent_logs.remove(&project_id);

        let history =
            agent::history_from(self.messages.get(&project_id).map(Vec::as_slice).unwrap_or(&[]));
        let request = GenerationRequest { prompt, history };
        let agent = Arc::clone(&self.agent);
        let events = self.agent_tx.clone();

        tokio::spawn(async move {
            let (log_tx, mut log_rx) = mpsc::channel::<String>(64);
            let log_events = events.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(line) = log_rx.recv().await {
                    if log_events
                        .send(AgentEvent::Log { project_id, line })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });

            let result = agent.generate(request, log_tx).await;
            let _ = forwarder.await;
            let _ = events.send(AgentEvent::Finished { project_id, result }).await;
        });
    }

    async fn handle_agent_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Log { project_id, line } => {
                let log = self.agent_logs.entry(project_id).or_default();
                log.push_str(&line);
                log.push('\n');
            }
            AgentEvent::Finished { project_id, result } => {
                self.generating.remove(&project_id);
                let reply = match result {
                    Ok(outcome) => Message::assistant_result(
                        outcome.summary.clone(),
                        Fragment::new(outcome.title, outcome.sandbox_url, outcome.files),
                    ),
                    Err(e) => {
                        self.status_message = Some(format!("Generation failed: {e}"));
                        Message::assistant_error(GENERATION_FAILED_MESSAGE)
                    }
                };
                if let Err(e) = self.store.append_message(&project_id, reply).await {
                    self.status_message = Some(format!("Failed to save reply: {e}"));
                }
                self.refresh().await;
            }
        }
    }

    /// Re-read the store and prune state for projects that no longer exist.
    async fn refresh(&mut self) {
        self.projects = self.store.list_projects().await;

        let mut messages = HashMap::new();
        for project in &self.projects {
            messages.insert(project.id, self.store.load_messages(&project.id).await);
        }
        self.messages = messages;
        self.usage = Some(self.ledger.status().await);

        let live: HashSet<ProjectId> = self.projects.iter().map(|p| p.id).collect();
        self.generating.retain(|id| live.contains(id));
        self.agent_logs.retain(|id, _| live.contains(id));
    }

    fn send_snapshot(&self) {
        let snapshot = StateSnapshot {
            projects: self.projects.clone(),
            messages: self.messages.clone(),
            generating: self.generating.clone(),
            agent_logs: self.agent_logs.clone(),
            usage: self.usage,
            status_message: self.status_message.clone(),
        };
        let _ = self.state_tx.send(Arc::new(snapshot));
    }
}
