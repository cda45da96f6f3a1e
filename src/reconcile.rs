use uuid::Uuid;

use crate::message::{Fragment, Message, MessageRole, MessageType};

/// Find the fragment that should be previewed for a message history: the
/// fragment of the most recent assistant message carrying one. `None` when
/// no assistant message has a fragment (including an empty history).
pub fn latest_fragment(messages: &[Message]) -> Option<&Fragment> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Assistant && m.fragment.is_some())
        .and_then(|m| m.fragment.as_ref())
}

/// True exactly when the user has sent a prompt and no assistant reply has
/// arrived yet, which is when the "agent is working" indicator shows.
pub fn is_awaiting_response(messages: &[Message]) -> bool {
    messages
        .last()
        .is_some_and(|m| m.role == MessageRole::User)
}

/// Process-local choice of which fragment the workspace shows.
///
/// Automatic selection deliberately does not re-run on every poll tick,
/// since that would clobber a manual choice twice a second. The first
/// snapshot after mount reconciles with the full backward scan; afterwards
/// auto-selection fires only when the history's tail message is new since
/// the previous snapshot and is an assistant RESULT carrying a fragment.
/// A manual selection sticks until the next qualifying arrival.
#[derive(Debug, Default)]
pub struct ActiveFragment {
    current: Option<Fragment>,
    last_tail: Option<Uuid>,
    observed_once: bool,
}

impl ActiveFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Fragment> {
        self.current.as_ref()
    }

    pub fn is_active(&self, fragment_id: &Uuid) -> bool {
        self.current.as_ref().is_some_and(|f| &f.id == fragment_id)
    }

    /// Explicit user selection of a fragment shown inline in a message.
    pub fn select(&mut self, fragment: Fragment) {
        self.current = Some(fragment);
    }

    /// Reset to "none", as on view mount or when switching projects.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed the latest message snapshot. Returns true when the active
    /// fragment changed.
    pub fn observe(&mut self, messages: &[Message]) -> bool {
        let tail = messages.last();
        let tail_id = tail.map(|m| m.id);
        let tail_is_new = self.last_tail != tail_id;
        self.last_tail = tail_id;

        if !self.observed_once {
            self.observed_once = true;
            let fresh = latest_fragment(messages).cloned();
            let changed = fresh.as_ref().map(|f| f.id) != self.current.as_ref().map(|f| f.id);
            if changed {
                self.current = fresh;
            }
            return changed;
        }

        if !tail_is_new {
            return false;
        }
        let Some(tail) = tail else {
            return false;
        };
        if tail.role == MessageRole::Assistant
            && tail.kind == MessageType::Result
            && tail.fragment.is_some()
        {
            let fresh = tail.fragment.clone();
            let changed = fresh.as_ref().map(|f| f.id) != self.current.as_ref().map(|f| f.id);
            if changed {
                self.current = fresh;
            }
            return changed;
        }
        false
    }
}
