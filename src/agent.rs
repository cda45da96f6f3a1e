use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::message::{FileCollection, Message, MessageRole};

/// How many recent messages ride along as generation context.
pub const HISTORY_LIMIT: usize = 5;

/// Fixed user-facing reply for any failed generation. The real cause goes
/// to the status bar, never into the conversation.
pub const GENERATION_FAILED_MESSAGE: &str = "Something went wrong, please try again";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryTurn {
    pub role: MessageRole,
    pub content: String,
}

/// What the agent process receives on stdin, as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
}

/// What the agent process must print to stdout: the generated file set and
/// the URL of the sandbox serving it, plus a summary and a short title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationOutcome {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub sandbox_url: String,
    #[serde(default)]
    pub files: FileCollection,
}

fn default_title() -> String {
    "Fragment".to_string()
}

impl GenerationOutcome {
    /// An outcome without a summary or without files is a failed
    /// generation, even when the process exited cleanly.
    pub fn validate(self) -> Result<Self> {
        ensure!(
            !self.summary.trim().is_empty(),
            "agent returned no task summary"
        );
        ensure!(!self.files.is_empty(), "agent returned no files");
        Ok(self)
    }
}

/// Trim a conversation to the context window the agent sees: the most
/// recent [`HISTORY_LIMIT`] turns, oldest first.
pub fn history_from(messages: &[Message]) -> Vec<HistoryTurn> {
    let start = messages.len().saturating_sub(HISTORY_LIMIT);
    messages[start..]
        .iter()
        .map(|m| HistoryTurn {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}

/// Seam to the external code-generation service. The shipped
/// implementation shells out; tests substitute their own.
#[async_trait]
pub trait CodegenAgent: Send + Sync {
    /// Run one generation. Progress lines (the child's stderr) are
    /// forwarded through `log` as they arrive; the call resolves when the
    /// agent finishes.
    async fn generate(
        &self,
        request: GenerationRequest,
        log: mpsc::Sender<String>,
    ) -> Result<GenerationOutcome>;
}

/// Runs a configurable shell command as the agent: request JSON on stdin,
/// outcome JSON on stdout, progress on stderr.
pub struct CommandAgent {
    command: String,
}

/// Default agent command; override with `--agent-cmd` or `LOOM_AGENT_CMD`.
pub const DEFAULT_AGENT_COMMAND: &str = "loom-agent";

impl CommandAgent {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_env() -> Self {
        let command =
            std::env::var("LOOM_AGENT_CMD").unwrap_or_else(|_| DEFAULT_AGENT_COMMAND.to_string());
        Self::new(command)
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl CodegenAgent for CommandAgent {
    async fn generate(
        &self,
        request: GenerationRequest,
        log: mpsc::Sender<String>,
    ) -> Result<GenerationOutcome> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start agent command: {}", self.command))?;

        let mut stdin = child.stdin.take().context("agent stdin unavailable")?;
        let payload = serde_json::to_vec(&request)?;
        stdin.write_all(&payload).await?;
        stdin.shutdown().await?;
        drop(stdin);

        let stderr = child.stderr.take().context("agent stderr unavailable")?;
        let log_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if log.send(line).await.is_err() {
                    break;
                }
            }
        });

        let mut stdout = child.stdout.take().context("agent stdout unavailable")?;
        let mut output = Vec::new();
        stdout.read_to_end(&mut output).await?;

        let status = child.wait().await?;
        let _ = log_task.await;

        ensure!(status.success(), "agent command exited with {status}");

        let outcome: GenerationOutcome =
            serde_json::from_slice(&output).context("agent output was not valid JSON")?;
        outcome.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome_json(summary: &str, files: &[(&str, &str)]) -> String {
        let files: FileCollection = files
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        serde_json::to_string(&GenerationOutcome {
            title: "App".to_string(),
            summary: summary.to_string(),
            sandbox_url: "https://3000-sbx.example.dev".to_string(),
            files,
        })
        .unwrap()
    }

    // ── outcome parsing/validation tests ─────────────────────────────

    #[test]
    fn outcome_title_defaults_to_fragment() {
        let json = r#"{"summary":"done","sandbox_url":"https://u","files":{"a":"1"}}"#;
        let outcome: GenerationOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.title, "Fragment");
    }

    #[test]
    fn outcome_without_summary_fails_validation() {
        let json = r#"{"sandbox_url":"https://u","files":{"a":"1"}}"#;
        let outcome: GenerationOutcome = serde_json::from_str(json).unwrap();
        assert!(outcome.validate().is_err());
    }

    #[test]
    fn outcome_without_files_fails_validation() {
        let json = r#"{"summary":"did things","sandbox_url":"https://u"}"#;
        let outcome: GenerationOutcome = serde_json::from_str(json).unwrap();
        assert!(outcome.validate().is_err());
    }

    #[test]
    fn complete_outcome_passes_validation() {
        let json = outcome_json("built the app", &[("app.tsx", "x")]);
        let outcome: GenerationOutcome = serde_json::from_str(&json).unwrap();
        assert!(outcome.validate().is_ok());
    }

    // ── history_from tests ───────────────────────────────────────────

    #[test]
    fn history_keeps_only_the_most_recent_turns() {
        let messages: Vec<Message> = (0..8).map(|i| Message::user(format!("m{i}"))).collect();
        let history = history_from(&messages);
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].content, "m3");
        assert_eq!(history[4].content, "m7");
    }

    #[test]
    fn history_of_short_conversation_is_complete() {
        let messages = vec![Message::user("only one")];
        let history = history_from(&messages);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::User);
    }

    #[test]
    fn history_of_empty_conversation_is_empty() {
        assert!(history_from(&[]).is_empty());
    }

    // ── CommandAgent subprocess tests ────────────────────────────────

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "build a todo app".to_string(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn command_agent_parses_stdout_outcome() {
        let json = outcome_json("built it", &[("app.tsx", "x")]);
        // `cat` would echo the request; emit a fixed outcome instead.
        let agent = CommandAgent::new(format!("cat >/dev/null; printf '%s' '{json}'"));
        let (tx, _rx) = mpsc::channel(8);
        let outcome = agent.generate(request(), tx).await.unwrap();
        assert_eq!(outcome.summary, "built it");
        assert_eq!(outcome.files.len(), 1);
    }

    #[tokio::test]
    async fn command_agent_streams_stderr_lines() {
        let json = outcome_json("ok", &[("a", "1")]);
        let agent = CommandAgent::new(format!(
            "cat >/dev/null; echo 'installing deps' >&2; echo 'writing files' >&2; printf '%s' '{json}'"
        ));
        let (tx, mut rx) = mpsc::channel(8);
        agent.generate(request(), tx).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("installing deps"));
        assert_eq!(rx.recv().await.as_deref(), Some("writing files"));
    }

    #[tokio::test]
    async fn command_agent_reads_the_request_from_stdin() {
        // The child inspects its stdin and fails unless the prompt is there.
        let json = outcome_json("ok", &[("a", "1")]);
        let agent = CommandAgent::new(format!(
            "grep -q 'build a todo app' && printf '%s' '{json}'"
        ));
        let (tx, _rx) = mpsc::channel(8);
        assert!(agent.generate(request(), tx).await.is_ok());
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error() {
        let agent = CommandAgent::new("cat >/dev/null; exit 3");
        let (tx, _rx) = mpsc::channel(8);
        let err = agent.generate(request(), tx).await.unwrap_err();
        assert!(err.to_string().contains("exited"));
    }

    #[tokio::test]
    async fn garbage_stdout_is_an_error() {
        let agent = CommandAgent::new("cat >/dev/null; echo 'not json'");
        let (tx, _rx) = mpsc::channel(8);
        let err = agent.generate(request(), tx).await.unwrap_err();
        assert!(err.to_string().contains("valid JSON"));
    }

    #[tokio::test]
    async fn clean_exit_with_empty_files_is_still_an_error() {
        let json = outcome_json("summary but nothing else", &[]);
        let agent = CommandAgent::new(format!("cat >/dev/null; printf '%s' '{json}'"));
        let (tx, _rx) = mpsc::channel(8);
        assert!(agent.generate(request(), tx).await.is_err());
    }
}
