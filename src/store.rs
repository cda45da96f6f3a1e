use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::message::Message;
use crate::project::{self, Project, ProjectId};

/// On-disk layout: `<base>/projects/<uuid>/project.json` plus a sibling
/// `messages.json` holding the ordered conversation. The backend polls this
/// store while the TUI runs; reads degrade to empty on missing or corrupt
/// files instead of failing the tick.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    base_dir: PathBuf,
}

/// Default base directory: `$LOOM_HOME` if set, else `~/.loom`.
pub fn default_base_dir() -> PathBuf {
    if let Ok(home) = std::env::var("LOOM_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".loom")
}

impl ProjectStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn project_dir(&self, id: &ProjectId) -> PathBuf {
        self.base_dir.join("projects").join(id.to_string())
    }

    fn project_path(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("project.json")
    }

    fn messages_path(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("messages.json")
    }

    /// List all projects, newest first. Unreadable entries are skipped.
    pub async fn list_projects(&self) -> Vec<Project> {
        let root = self.base_dir.join("projects");
        let mut projects = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(&root).await else {
            return projects;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path().join("project.json");
            if let Ok(contents) = tokio::fs::read_to_string(&path).await {
                if let Ok(project) = serde_json::from_str::<Project>(&contents) {
                    projects.push(project);
                }
            }
        }
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }

    /// Create a project named with a fresh slug and persist its initial
    /// user message. Returns the project together with that message.
    pub async fn create_project(&self, prompt: &str) -> Result<(Project, Message)> {
        let existing: Vec<String> = self
            .list_projects()
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        let project = Project::new(project::generate_name(&existing));
        let first = Message::user(prompt);

        self.save_project(&project).await?;
        self.save_messages(&project.id, &[first.clone()]).await?;
        Ok((project, first))
    }

    /// Load a project's conversation, ordered ascending by creation time.
    pub async fn load_messages(&self, id: &ProjectId) -> Vec<Message> {
        let path = self.messages_path(id);
        let mut messages: Vec<Message> = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        messages
    }

    /// Append one message (load-modify-save) and bump the project's
    /// `updated_at`.
    pub async fn append_message(&self, id: &ProjectId, message: Message) -> Result<()> {
        let mut messages = self.load_messages(id).await;
        messages.push(message);
        self.save_messages(id, &messages).await?;

        if let Some(mut project) = self.load_project(id).await {
            project.updated_at = chrono::Utc::now();
            self.save_project(&project).await?;
        }
        Ok(())
    }

    pub async fn load_project(&self, id: &ProjectId) -> Option<Project> {
        let contents = tokio::fs::read_to_string(self.project_path(id)).await.ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub async fn delete_project(&self, id: &ProjectId) -> Result<()> {
        let dir = self.project_dir(id);
        tokio::fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to delete project directory {}", dir.display()))
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let json = serde_json::to_string_pretty(project)?;
        self.write_atomic(&self.project_path(&project.id), json).await
    }

    async fn save_messages(&self, id: &ProjectId, messages: &[Message]) -> Result<()> {
        let json = serde_json::to_string_pretty(messages)?;
        self.write_atomic(&self.messages_path(id), json).await
    }

    /// Write-temp-then-rename so a crash mid-write never corrupts the file.
    async fn write_atomic(&self, path: &Path, contents: String) -> Result<()> {
        let parent = path
            .parent()
            .context("Store path has no parent directory")?;
        tokio::fs::create_dir_all(parent).await?;
        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        tokio::fs::write(tmp.path(), contents).await?;
        tmp.persist(path)
            .with_context(|| format!("Failed to persist {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Fragment, MessageRole, MessageType};

    fn store() -> (tempfile::TempDir, ProjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list_projects().await.is_empty());
    }

    #[tokio::test]
    async fn create_project_persists_project_and_first_message() {
        let (_dir, store) = store();
        let (project, first) = store.create_project("build a landing page").await.unwrap();

        let listed = store.list_projects().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, project.id);

        let messages = store.load_messages(&project.id).await;
        assert_eq!(messages, vec![first.clone()]);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "build a landing page");
    }

    #[tokio::test]
    async fn created_projects_get_distinct_names() {
        let (_dir, store) = store();
        let (a, _) = store.create_project("one").await.unwrap();
        let (b, _) = store.create_project("two").await.unwrap();
        assert_ne!(a.name, b.name);
    }

    #[tokio::test]
    async fn append_message_keeps_creation_order() {
        let (_dir, store) = store();
        let (project, _) = store.create_project("start").await.unwrap();

        let mut files = crate::message::FileCollection::new();
        files.insert("app.tsx".to_string(), "x".to_string());
        let reply =
            Message::assistant_result("Here you go", Fragment::new("App", "https://u", files));
        store.append_message(&project.id, reply.clone()).await.unwrap();

        let messages = store.load_messages(&project.id).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].id, reply.id);
        assert_eq!(messages[1].kind, MessageType::Result);
        assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn append_message_bumps_updated_at() {
        let (_dir, store) = store();
        let (project, _) = store.create_project("start").await.unwrap();
        let before = store.load_project(&project.id).await.unwrap().updated_at;

        store
            .append_message(&project.id, Message::assistant_error("oops"))
            .await
            .unwrap();
        let after = store.load_project(&project.id).await.unwrap().updated_at;
        assert!(after >= before);
    }

    #[tokio::test]
    async fn delete_project_removes_everything() {
        let (_dir, store) = store();
        let (project, _) = store.create_project("doomed").await.unwrap();
        store.delete_project(&project.id).await.unwrap();
        assert!(store.list_projects().await.is_empty());
        assert!(store.load_messages(&project.id).await.is_empty());
        assert!(store.load_project(&project.id).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_messages_file_degrades_to_empty() {
        let (_dir, store) = store();
        let (project, _) = store.create_project("start").await.unwrap();
        tokio::fs::write(store.messages_path(&project.id), "{not json")
            .await
            .unwrap();
        assert!(store.load_messages(&project.id).await.is_empty());
    }

    #[tokio::test]
    async fn list_projects_is_newest_first() {
        let (_dir, store) = store();
        let (first, _) = store.create_project("one").await.unwrap();
        let (second, _) = store.create_project("two").await.unwrap();
        let listed = store.list_projects().await;
        assert_eq!(listed.len(), 2);
        // Creation timestamps can tie at this resolution; newest-first must
        // hold whenever they differ.
        if first.created_at != second.created_at {
            assert_eq!(listed[0].id, second.id);
            assert_eq!(listed[1].id, first.id);
        }
    }

    #[tokio::test]
    async fn fragment_files_survive_a_store_roundtrip() {
        let (_dir, store) = store();
        let (project, _) = store.create_project("start").await.unwrap();

        let mut files = crate::message::FileCollection::new();
        files.insert("src/app.tsx".to_string(), "a".to_string());
        files.insert("src/lib/util.ts".to_string(), "b".to_string());
        files.insert("README.md".to_string(), "c".to_string());
        let reply =
            Message::assistant_result("done", Fragment::new("App", "https://u", files.clone()));
        store.append_message(&project.id, reply).await.unwrap();

        let messages = store.load_messages(&project.id).await;
        let stored = messages[1].fragment.as_ref().unwrap();
        assert_eq!(stored.files, files);
        let keys: Vec<&String> = stored.files.keys().collect();
        assert_eq!(keys, ["src/app.tsx", "src/lib/util.ts", "README.md"]);
    }
}
