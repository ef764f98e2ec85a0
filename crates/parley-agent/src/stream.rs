use serde::{Deserialize, Serialize};

/// Why the backend stopped producing a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum FinishReason {
    /// Normal end of the answer.
    Stop,
    /// The turn ends with tool-call requests.
    ToolCalls,
    /// The backend hit its output limit.
    Length,
    /// Transport failure or backend error payload.
    Error(String),
}

impl FinishReason {
    /// Maps a backend `finish_reason` string.
    ///
    /// Values without a dedicated variant (`content_filter`, vendor
    /// specific ones) end the turn like `stop`.
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "error" => FinishReason::Error("backend reported an error".to_string()),
            _ => FinishReason::Stop,
        }
    }
}

/// Normalized events produced by every protocol adapter.
///
/// A well-formed event sequence ends with exactly one `TurnFinished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of assistant text.
    ContentDelta { text: String },

    /// A chunk of reasoning text.
    ReasoningDelta { text: String },

    /// A new tool call opened at `index`.
    ToolCallStarted {
        index: u32,
        id: String,
        name: String,
    },

    /// A fragment of the JSON arguments of the call at `index`.
    ToolCallArgsDelta { index: u32, text: String },

    /// The turn is over.
    TurnFinished { reason: FinishReason },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        StreamEvent::ContentDelta { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        StreamEvent::ReasoningDelta { text: text.into() }
    }

    pub fn tool_started(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        StreamEvent::ToolCallStarted {
            index,
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn tool_args(index: u32, text: impl Into<String>) -> Self {
        StreamEvent::ToolCallArgsDelta {
            index,
            text: text.into(),
        }
    }

    pub fn finished(reason: FinishReason) -> Self {
        StreamEvent::TurnFinished { reason }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, StreamEvent::TurnFinished { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_wire("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_wire("content_filter"), FinishReason::Stop);
        assert!(matches!(FinishReason::from_wire("error"), FinishReason::Error(_)));
    }

    #[test]
    fn test_stream_event_serialization() {
        let event = StreamEvent::tool_started(1, "call_1", "get_date");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_call_started");
        assert_eq!(json["index"], 1);
        assert_eq!(json["name"], "get_date");

        let done = serde_json::to_value(StreamEvent::finished(FinishReason::ToolCalls)).unwrap();
        assert_eq!(done["reason"]["reason"], "tool_calls");
    }
}
