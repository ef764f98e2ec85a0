use chrono::{DateTime, Utc};
use parley_core::{Message, ParleyError, ParleyResult, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;
use tracing::debug;
use uuid::Uuid;

/// What [`ConversationStore::clear`] leaves behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearMode {
    /// Reset to the single opening system message.
    #[default]
    KeepSystem,
    /// Reset to an empty log; the next append must be a system message.
    Empty,
}

/// A position in the log that [`ConversationStore::rollback`] can return to.
///
/// A checkpoint taken before a [`ConversationStore::clear`] is no longer
/// valid after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    generation: u64,
    len: usize,
}

/// Ordered, append-only log of one conversation.
///
/// Every append is validated:
/// - the log opens with exactly one system message;
/// - only assistant messages carry tool calls, with unique non-empty ids;
/// - a tool message answers a call of the most recent assistant message,
///   at most once.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    id: Uuid,
    system_prompt: String,
    clear_mode: ClearMode,
    messages: Vec<Message>,
    generation: u64,
    updated_at: DateTime<Utc>,
}

impl ConversationStore {
    /// Opens a conversation with `system_prompt` as its system message.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self::with_clear_mode(system_prompt, ClearMode::KeepSystem)
    }

    /// Like [`ConversationStore::new`] with an explicit clear behaviour.
    pub fn with_clear_mode(system_prompt: impl Into<String>, clear_mode: ClearMode) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            id: Uuid::new_v4(),
            messages: vec![Message::system(system_prompt.clone())],
            system_prompt,
            clear_mode,
            generation: 0,
            updated_at: Utc::now(),
        }
    }

    /// Conversation identifier, stable across clears.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The system prompt this conversation was opened with.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Time of the last mutation.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Read-only view of the log.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy of the log, detached from later appends.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Number of messages in the log.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty (only possible after an [`ClearMode::Empty`] clear).
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Appends `message` if it keeps the log well-formed.
    pub fn append(&mut self, message: Message) -> ParleyResult<()> {
        self.validate(&message)?;
        self.updated_at = Utc::now();
        self.messages.push(message);
        Ok(())
    }

    /// Checks `message` against the log without appending it.
    pub fn validate(&self, message: &Message) -> ParleyResult<()> {
        if self.messages.is_empty() && message.role != Role::System {
            return Err(invalid("conversation must open with a system message"));
        }
        if message.role == Role::System && !self.messages.is_empty() {
            return Err(invalid("a conversation holds exactly one system message"));
        }
        if message.role != Role::Assistant && message.has_tool_calls() {
            return Err(invalid(format!(
                "{} messages cannot carry tool calls",
                message.role
            )));
        }
        if message.role != Role::Tool && message.tool_call_id.is_some() {
            return Err(invalid(format!(
                "{} messages cannot answer a tool call",
                message.role
            )));
        }

        match message.role {
            Role::Assistant => {
                let mut seen = HashSet::new();
                for call in &message.tool_calls {
                    if call.id.is_empty() {
                        return Err(invalid("tool call with an empty id"));
                    }
                    if !seen.insert(call.id.as_str()) {
                        return Err(invalid(format!("duplicate tool call id '{}'", call.id)));
                    }
                }
                Ok(())
            }
            Role::Tool => self.validate_tool_result(message),
            Role::System | Role::User => Ok(()),
        }
    }

    fn validate_tool_result(&self, message: &Message) -> ParleyResult<()> {
        let call_id = message
            .tool_call_id
            .as_deref()
            .ok_or_else(|| invalid("tool message without a tool_call_id"))?;

        let pos = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant)
            .ok_or_else(|| invalid("tool result without a preceding assistant message"))?;

        if !self.messages[pos].tool_calls.iter().any(|c| c.id == call_id) {
            return Err(invalid(format!(
                "tool result '{call_id}' does not match any call of the latest assistant message"
            )));
        }

        let answered = self.messages[pos + 1..]
            .iter()
            .any(|m| m.tool_call_id.as_deref() == Some(call_id));
        if answered {
            return Err(invalid(format!("tool call '{call_id}' already answered")));
        }
        Ok(())
    }

    /// Role-tagged plain-text rendering of the log for external readers.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for msg in &self.messages {
            let _ = writeln!(out, "// ===={}====", msg.role);
            if let Some(call_id) = &msg.tool_call_id {
                let _ = write!(out, "[{call_id}] ");
            }
            let _ = writeln!(out, "{}", msg.text());
            for call in &msg.tool_calls {
                let _ = writeln!(out, "-> {}({})", call.name, call.arguments);
            }
        }
        out.push_str("// ========\n");
        out
    }

    /// Resets the log according to the configured [`ClearMode`].
    ///
    /// Outstanding checkpoints are invalidated.
    pub fn clear(&mut self) {
        self.messages.clear();
        if self.clear_mode == ClearMode::KeepSystem {
            self.messages.push(Message::system(self.system_prompt.clone()));
        }
        self.generation += 1;
        self.updated_at = Utc::now();
        debug!(conversation = %self.id, mode = ?self.clear_mode, "Conversation cleared");
    }

    /// Marks the current end of the log.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            generation: self.generation,
            len: self.messages.len(),
        }
    }

    /// Drops every message appended after `checkpoint`.
    ///
    /// A prefix of a well-formed log is well-formed, so this never breaks the
    /// invariants.
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> ParleyResult<()> {
        if checkpoint.generation != self.generation || checkpoint.len > self.messages.len() {
            return Err(invalid("checkpoint does not belong to the current log"));
        }
        let dropped = self.messages.len() - checkpoint.len;
        self.messages.truncate(checkpoint.len);
        if dropped > 0 {
            self.updated_at = Utc::now();
            debug!(conversation = %self.id, dropped, "Rolled back conversation");
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ParleyError {
    ParleyError::InvalidMessage(reason.into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parley_core::ToolCallRef;

    fn store_with_call() -> ConversationStore {
        let mut store = ConversationStore::new("sys");
        store.append(Message::user("what day is it?")).unwrap();
        store
            .append(Message::assistant_turn(
                None,
                None,
                vec![ToolCallRef::new("call_0", "get_date", "{}")],
            ))
            .unwrap();
        store
    }

    #[test]
    fn opens_with_system_message() {
        let store = ConversationStore::new("You are a helpful assistant");
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].role, Role::System);
        assert_eq!(store.messages()[0].text(), "You are a helpful assistant");
    }

    #[test]
    fn rejects_second_system_message() {
        let mut store = ConversationStore::new("sys");
        let err = store.append(Message::system("again")).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidMessage(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tool_result_must_match_latest_assistant_call() {
        let mut store = store_with_call();
        assert!(store.append(Message::tool("call_9", "nope")).is_err());
        store.append(Message::tool("call_0", "2025-12-01")).unwrap();
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn tool_result_cannot_answer_twice() {
        let mut store = store_with_call();
        store.append(Message::tool("call_0", "first")).unwrap();
        assert!(store.append(Message::tool("call_0", "second")).is_err());
    }

    #[test]
    fn tool_result_only_links_to_most_recent_assistant() {
        let mut store = store_with_call();
        store.append(Message::tool("call_0", "2025-12-01")).unwrap();
        store.append(Message::assistant("It is December 1st.")).unwrap();
        assert!(store.append(Message::tool("call_0", "late")).is_err());
    }

    #[test]
    fn assistant_rejects_duplicate_call_ids() {
        let mut store = ConversationStore::new("sys");
        store.append(Message::user("hi")).unwrap();
        let msg = Message::assistant_turn(
            None,
            None,
            vec![
                ToolCallRef::new("dup", "a", "{}"),
                ToolCallRef::new("dup", "b", "{}"),
            ],
        );
        assert!(store.append(msg).is_err());
    }

    #[test]
    fn clear_keeps_system_message() {
        let mut store = store_with_call();
        store.clear();
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].role, Role::System);
        assert!(store.append(Message::tool("call_0", "x")).is_err());
    }

    #[test]
    fn empty_clear_mode_requires_new_system_message() {
        let mut store = ConversationStore::with_clear_mode("sys", ClearMode::Empty);
        store.append(Message::user("hi")).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(store.append(Message::user("hello")).is_err());
        store.append(Message::system("fresh")).unwrap();
        store.append(Message::user("hello")).unwrap();
    }

    #[test]
    fn rollback_restores_checkpoint() {
        let mut store = ConversationStore::new("sys");
        let cp = store.checkpoint();
        store.append(Message::user("hi")).unwrap();
        store.append(Message::assistant("hello")).unwrap();
        store.rollback(cp).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rollback_after_clear_is_rejected() {
        let mut store = ConversationStore::new("sys");
        store.append(Message::user("hi")).unwrap();
        let cp = store.checkpoint();
        store.clear();
        assert!(store.rollback(cp).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn transcript_renders_role_blocks() {
        let mut store = store_with_call();
        store.append(Message::tool("call_0", "2025-12-01")).unwrap();
        let text = store.transcript();
        assert!(text.starts_with("// ====system====\nsys\n"));
        assert!(text.contains("// ====assistant====\n\n-> get_date({})\n"));
        assert!(text.contains("// ====tool====\n[call_0] 2025-12-01\n"));
        assert!(text.ends_with("// ========\n"));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut store = ConversationStore::new("sys");
        let snap = store.snapshot();
        store.append(Message::user("later")).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(store.len(), 2);
    }
}
