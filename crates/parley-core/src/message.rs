use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of the participant that authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system-level instruction.
    System,
    /// A human end-user.
    User,
    /// The language model.
    Assistant,
    /// Output produced by a tool invocation.
    Tool,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the assistant.
///
/// While a turn is streaming, `arguments` holds whatever fragments have
/// arrived so far and is not guaranteed to parse. Once the turn is finalized
/// it is the complete JSON text sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRef {
    /// Identifier assigned by the backend (or synthesized by the adapter).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw JSON text of the arguments.
    pub arguments: String,
}

impl ToolCallRef {
    /// Creates a tool-call reference.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parses the accumulated argument text.
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// A single message of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// The role of the message author.
    pub role: Role,
    /// Text content; `None` for assistant turns that only request tools.
    pub content: Option<String>,
    /// Reasoning text streamed alongside the content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRef>,
    /// The call a tool message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            reasoning: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a new message with [`Role::System`].
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Creates a plain assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(content.into()))
    }

    /// Creates an assistant message from the parts of a finished turn.
    pub fn assistant_turn(
        content: Option<String>,
        reasoning: Option<String>,
        tool_calls: Vec<ToolCallRef>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        msg.reasoning = reasoning;
        msg.tool_calls = tool_calls;
        msg
    }

    /// Creates a tool result answering `call_id`.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, Some(content.into()));
        msg.tool_call_id = Some(call_id.into());
        msg
    }

    /// Content as a string slice, empty when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Whether this is an assistant message requesting tools.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_message_links_call() {
        let msg = Message::tool("call_1", "2025-12-01");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.text(), "2025-12-01");
    }

    #[test]
    fn test_assistant_turn_without_content() {
        let msg = Message::assistant_turn(
            None,
            Some("thinking".into()),
            vec![ToolCallRef::new("call_0", "get_date", "{}")],
        );
        assert!(msg.has_tool_calls());
        assert_eq!(msg.text(), "");
        assert_eq!(msg.reasoning.as_deref(), Some("thinking"));
    }

    #[test]
    fn test_partial_arguments_do_not_parse() {
        let call = ToolCallRef::new("c", "get_weather", "{\"location\":\"NY");
        assert!(call.parse_arguments().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
