pub mod ollama;
pub mod openai;

use crate::accumulator::{AssistantTurn, TurnObserver};
use crate::framing::MalformedFrame;
use crate::stream::{FinishReason, StreamEvent};
use async_trait::async_trait;
use parley_core::{Message, ParleyResult, Role};
use parley_tools::ToolDescriptor;
use tokio_util::sync::CancellationToken;

/// Everything a backend needs to produce one assistant turn.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    /// Overrides the conversation's own system message when set.
    pub system_prompt: Option<&'a str>,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDescriptor],
    pub stream: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl<'a> ChatRequest<'a> {
    /// System prompt to send: the override, else the conversation's own.
    pub fn effective_system_prompt(&self) -> Option<&'a str> {
        self.system_prompt.or_else(|| {
            self.messages
                .iter()
                .find(|m| m.role == Role::System)
                .and_then(|m| m.content.as_deref())
        })
    }
}

/// Trait for whatever produces assistant turns.
///
/// [`crate::LlmClient`] implements it over HTTP; the runner only sees this
/// seam, so tests drive it with scripted backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Requests one turn for `messages`, forwarding deltas to `observer`.
    ///
    /// Returns [`parley_core::ParleyError::Cancelled`] as soon as `cancel`
    /// fires; the partial turn is discarded.
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
        observer: &mut dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> ParleyResult<AssistantTurn>;
}

/// Wire-format knowledge for one backend family.
///
/// Selected once when the client is built; nothing outside the adapter
/// branches on the backend kind.
pub trait ProtocolAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// JSON body of the outbound request.
    fn build_body(&self, request: &ChatRequest<'_>) -> serde_json::Value;

    /// Fresh per-response line decoder.
    fn decoder(&self) -> Box<dyn FrameDecoder>;

    /// Maps a complete non-streaming response to the equivalent events.
    fn decode_response(&self, body: &serde_json::Value) -> ParleyResult<Vec<StreamEvent>>;
}

/// Decodes the complete lines of one streamed response.
pub trait FrameDecoder: Send {
    /// Events carried by `line`; blank and comment lines yield none.
    fn decode_line(&mut self, line: &str) -> Result<Vec<StreamEvent>, MalformedFrame>;

    /// Finish reason used when input ends without an explicit one.
    fn implicit_finish(&self) -> FinishReason;
}

/// Pulls a human-readable message out of an `{"error": ...}` payload.
pub(crate) fn error_message(error: &serde_json::Value) -> String {
    error["message"]
        .as_str()
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Chat-completions style message list shared by both wire formats.
///
/// The formats differ only in how an assistant turn carries its tool calls,
/// which `assistant_entry` renders.
pub(crate) fn build_messages(
    request: &ChatRequest<'_>,
    assistant_entry: fn(&Message) -> serde_json::Value,
) -> Vec<serde_json::Value> {
    let mut api_messages: Vec<serde_json::Value> = Vec::new();

    if let Some(sys) = request.effective_system_prompt() {
        api_messages.push(serde_json::json!({
            "role": "system",
            "content": sys
        }));
    }

    for m in request.messages {
        match m.role {
            Role::System => continue,
            Role::User => api_messages.push(serde_json::json!({
                "role": "user",
                "content": m.text()
            })),
            Role::Assistant => api_messages.push(assistant_entry(m)),
            Role::Tool => api_messages.push(serde_json::json!({
                "role": "tool",
                "tool_call_id": m.tool_call_id,
                "content": m.text()
            })),
        }
    }

    api_messages
}
