use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flat mapping from a slash-delimited relative path to file content.
/// Insertion order is preserved; the explorer derives its tree from it.
pub type FileCollection = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Result,
    Error,
}

/// A generated artifact attached to one assistant reply: the file set the
/// agent produced plus the live preview URL of the sandbox serving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: Uuid,
    pub title: String,
    pub sandbox_url: String,
    pub files: FileCollection,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fragment {
    pub fn new(title: impl Into<String>, sandbox_url: impl Into<String>, files: FileCollection) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            sandbox_url: sandbox_url.into(),
            files,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One turn of a project conversation. Immutable once created; the store
/// returns messages ordered ascending by `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub created_at: DateTime<Utc>,
    pub fragment: Option<Fragment>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            content: content.into(),
            kind: MessageType::Result,
            created_at: Utc::now(),
            fragment: None,
        }
    }

    pub fn assistant_result(content: impl Into<String>, fragment: Fragment) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: content.into(),
            kind: MessageType::Result,
            created_at: Utc::now(),
            fragment: Some(fragment),
        }
    }

    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: content.into(),
            kind: MessageType::Error,
            created_at: Utc::now(),
            fragment: None,
        }
    }

    /// True for the assistant replies that carry a selectable artifact.
    pub fn has_fragment(&self) -> bool {
        self.role == MessageRole::Assistant && self.fragment.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_files() -> FileCollection {
        let mut files = FileCollection::new();
        files.insert("app.tsx".to_string(), "export default 1".to_string());
        files.insert("lib/util.ts".to_string(), "export {}".to_string());
        files
    }

    // ── constructor tests ────────────────────────────────────────────

    #[test]
    fn user_message_has_result_type_and_no_fragment() {
        let m = Message::user("build me a todo app");
        assert_eq!(m.role, MessageRole::User);
        assert_eq!(m.kind, MessageType::Result);
        assert!(m.fragment.is_none());
        assert!(!m.has_fragment());
    }

    #[test]
    fn assistant_result_carries_fragment() {
        let fragment = Fragment::new("Todo app", "https://3000-sbx.example.dev", sample_files());
        let m = Message::assistant_result("Here you go", fragment.clone());
        assert_eq!(m.kind, MessageType::Result);
        assert!(m.has_fragment());
        assert_eq!(m.fragment.unwrap().title, fragment.title);
    }

    #[test]
    fn assistant_error_has_no_fragment() {
        let m = Message::assistant_error("Something went wrong, please try again");
        assert_eq!(m.role, MessageRole::Assistant);
        assert_eq!(m.kind, MessageType::Error);
        assert!(!m.has_fragment());
    }

    // ── serde tests ──────────────────────────────────────────────────

    #[test]
    fn role_and_type_serialize_screaming_snake() {
        let m = Message::user("hi");
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"USER\""));
        assert!(json.contains("\"type\":\"RESULT\""));
    }

    #[test]
    fn message_roundtrips_through_json() {
        let fragment = Fragment::new("Landing page", "https://sbx.example.dev", sample_files());
        let m = Message::assistant_result("done", fragment);
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn file_collection_preserves_insertion_order() {
        let fragment = Fragment::new("t", "u", sample_files());
        let json = serde_json::to_string(&fragment).unwrap();
        let back: Fragment = serde_json::from_str(&json).unwrap();
        let keys: Vec<&String> = back.files.keys().collect();
        assert_eq!(keys, ["app.tsx", "lib/util.ts"]);
    }
}
