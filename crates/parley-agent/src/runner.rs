use crate::accumulator::TurnObserver;
use crate::backends::LlmBackend;
use crate::config::{ModelConfig, UnknownToolPolicy};
use crate::llm::LlmClient;
use parley_core::{Message, ParleyError, ParleyResult, ToolCallRef};
use parley_session::ConversationStore;
use parley_tools::ToolRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives the tool-calling loop for one user turn at a time.
/// Prompt → backend → tool calls → execute → append results → repeat.
pub struct ConversationRunner {
    backend: Arc<dyn LlmBackend>,
    tools: Arc<ToolRegistry>,
    max_round_trips: u32,
    unknown_tool_policy: UnknownToolPolicy,
}

impl ConversationRunner {
    pub fn new(config: ModelConfig, tools: Arc<ToolRegistry>) -> Self {
        let max_round_trips = config.max_round_trips;
        let unknown_tool_policy = config.unknown_tool_policy;
        Self {
            backend: Arc::new(LlmClient::new(config)),
            tools,
            max_round_trips,
            unknown_tool_policy,
        }
    }

    /// Runner over an arbitrary backend.
    pub fn with_backend(
        backend: Arc<dyn LlmBackend>,
        tools: Arc<ToolRegistry>,
        max_round_trips: u32,
        unknown_tool_policy: UnknownToolPolicy,
    ) -> Self {
        Self {
            backend,
            tools,
            max_round_trips,
            unknown_tool_policy,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_round_trips(&self) -> u32 {
        self.max_round_trips
    }

    /// Runs one user turn and returns the final assistant content.
    ///
    /// `instruction` replaces the conversation's system message for the
    /// outbound requests of this turn only. On error the store is rolled back
    /// to where it was before the turn started. A runner bounded to zero
    /// round trips fails with [`ParleyError::Config`] without touching the
    /// store.
    pub async fn run(
        &self,
        store: &mut ConversationStore,
        instruction: Option<&str>,
        user_input: &str,
        observer: &mut dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> ParleyResult<String> {
        if self.max_round_trips == 0 {
            return Err(ParleyError::Config(
                "max_round_trips must be at least 1".to_string(),
            ));
        }

        let checkpoint = store.checkpoint();
        let result = self
            .drive(store, instruction, user_input, observer, cancel)
            .await;

        if let Err(e) = &result {
            warn!(conversation = %store.id(), error = %e, "User turn failed; rolling back");
            store.rollback(checkpoint)?;
        }
        result
    }

    async fn drive(
        &self,
        store: &mut ConversationStore,
        instruction: Option<&str>,
        user_input: &str,
        observer: &mut dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> ParleyResult<String> {
        let conversation = store.id();

        if store.is_empty() {
            let system = Message::system(store.system_prompt());
            store.append(system)?;
        }
        store.append(Message::user(user_input))?;

        let descriptors = self.tools.descriptors();
        let mut partial_content = String::new();

        info!(conversation = %conversation, "Starting tool loop");

        for round_trip in 0..self.max_round_trips {
            info!(round_trip, "Requesting assistant turn");

            let turn = self
                .backend
                .complete(instruction, store.messages(), &descriptors, observer, cancel)
                .await?;

            if !turn.has_tool_calls() {
                let content = turn.content.clone();
                store.append(turn.into_message())?;
                info!(
                    conversation = %conversation,
                    round_trips = round_trip + 1,
                    "Tool loop completed"
                );
                return Ok(content);
            }

            partial_content.push_str(&turn.content);
            let calls = turn.tool_calls.clone();
            store.append(turn.into_message())?;

            for call in &calls {
                if cancel.is_cancelled() {
                    return Err(ParleyError::Cancelled);
                }
                if let Some(result) = self.execute_call(call).await {
                    store.append(Message::tool(call.id.clone(), result))?;
                    observer.on_tool_call(&format!("{}({})", call.name, call.arguments));
                }
            }
        }

        warn!(
            conversation = %conversation,
            max_round_trips = self.max_round_trips,
            "Tool loop reached its bound"
        );

        Err(ParleyError::ToolLoopExceeded {
            max_round_trips: self.max_round_trips,
            partial_content,
        })
    }

    /// Runs one call. `None` means no tool result is appended for it.
    async fn execute_call(&self, call: &ToolCallRef) -> Option<String> {
        let arguments = if call.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            match call.parse_arguments() {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        tool = %call.name,
                        call_id = %call.id,
                        error = %e,
                        "Invalid tool arguments; using {{}}"
                    );
                    serde_json::json!({})
                }
            }
        };

        info!(tool = %call.name, call_id = %call.id, "Executing tool call");

        match self.tools.execute(&call.name, arguments).await {
            Ok(output) => Some(output),
            Err(ParleyError::UnknownTool(name)) => {
                warn!(tool = %name, call_id = %call.id, "Backend requested an unknown tool");
                match self.unknown_tool_policy {
                    UnknownToolPolicy::Skip => None,
                    UnknownToolPolicy::ErrorResult => {
                        Some(format!("ERROR: unknown tool '{name}'"))
                    }
                }
            }
            Err(ParleyError::ToolExecution(msg)) => {
                warn!(tool = %call.name, error = %msg, "Tool execution failed");
                Some(format!("ERROR: {msg}"))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                Some(format!("ERROR: {e}"))
            }
        }
    }
}
