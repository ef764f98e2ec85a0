//! Folding normalized events into complete assistant turns.

use crate::stream::{FinishReason, StreamEvent};
use futures_util::{Stream, StreamExt};
use parley_core::{Message, ParleyError, ParleyResult, ToolCallRef};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Receives incremental output while a turn is being produced.
///
/// All methods default to no-ops.
pub trait TurnObserver: Send {
    fn on_content(&mut self, _text: &str) {}

    /// Reasoning text. A single `"\n"` is sent once when the turn moves
    /// from reasoning to content.
    fn on_reasoning(&mut self, _text: &str) {}

    /// A tool call after execution, rendered as `name(arguments)`.
    fn on_tool_call(&mut self, _call: &str) {}
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

/// One finalized assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantTurn {
    pub content: String,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCallRef>,
    pub finish_reason: FinishReason,
}

impl AssistantTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Converts into the assistant message to append to the store.
    pub fn into_message(self) -> Message {
        let content = Some(self.content).filter(|c| !c.is_empty());
        let reasoning = Some(self.reasoning).filter(|r| !r.is_empty());
        Message::assistant_turn(content, reasoning, self.tool_calls)
    }
}

#[derive(Debug, Default)]
struct PendingTurn {
    content: String,
    reasoning: String,
    calls: BTreeMap<u32, ToolCallRef>,
    boundary_sent: bool,
}

/// Builds turns from a stream of [`StreamEvent`]s.
///
/// Tool-call fragments are keyed by index, so interleaved fragments of
/// several calls reassemble independently. Calls are finalized in
/// ascending index order.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    pending: PendingTurn,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event. Returns the finished turn on `TurnFinished`.
    ///
    /// A `TurnFinished(Error)` resets the accumulator and surfaces as
    /// [`ParleyError::Transport`].
    pub fn apply(
        &mut self,
        event: StreamEvent,
        observer: &mut dyn TurnObserver,
    ) -> ParleyResult<Option<AssistantTurn>> {
        let pending = &mut self.pending;
        match event {
            StreamEvent::ReasoningDelta { text } => {
                if !text.is_empty() {
                    observer.on_reasoning(&text);
                    pending.reasoning.push_str(&text);
                }
            }
            StreamEvent::ContentDelta { text } => {
                if text.is_empty() {
                    return Ok(None);
                }
                if !pending.reasoning.is_empty() && !pending.boundary_sent {
                    pending.boundary_sent = true;
                    observer.on_reasoning("\n");
                }
                observer.on_content(&text);
                pending.content.push_str(&text);
            }
            StreamEvent::ToolCallStarted { index, id, name } => {
                let call = pending
                    .calls
                    .entry(index)
                    .or_insert_with(|| ToolCallRef::new("", "", ""));
                if call.id.is_empty() {
                    call.id = id;
                }
                if call.name.is_empty() {
                    call.name = name;
                }
            }
            StreamEvent::ToolCallArgsDelta { index, text } => match pending.calls.get_mut(&index) {
                Some(call) => call.arguments.push_str(&text),
                None => debug!(index, "Arguments for a call that never started; ignored"),
            },
            StreamEvent::TurnFinished { reason } => {
                let turn = std::mem::take(pending);
                return finalize(turn, reason).map(Some);
            }
        }
        Ok(None)
    }
}

fn finalize(turn: PendingTurn, reason: FinishReason) -> ParleyResult<AssistantTurn> {
    let tool_calls = match &reason {
        FinishReason::Error(message) => return Err(ParleyError::Transport(message.clone())),
        FinishReason::ToolCalls => turn
            .calls
            .into_values()
            .map(|mut call| {
                // A call that streamed no argument text takes no arguments.
                if call.arguments.trim().is_empty() {
                    call.arguments = "{}".to_string();
                }
                call
            })
            .collect(),
        FinishReason::Stop | FinishReason::Length => {
            if !turn.calls.is_empty() {
                warn!(
                    open_calls = turn.calls.len(),
                    reason = ?reason,
                    "Turn ended without tool_calls; dropping open calls"
                );
            }
            Vec::new()
        }
    };

    Ok(AssistantTurn {
        content: turn.content,
        reasoning: turn.reasoning,
        tool_calls,
        finish_reason: reason,
    })
}

/// Drains `events` into one [`AssistantTurn`].
///
/// Returns [`ParleyError::Cancelled`] as soon as `cancel` fires and
/// [`ParleyError::Transport`] when the stream ends without finishing.
pub async fn collect_turn<S>(
    events: S,
    observer: &mut dyn TurnObserver,
    cancel: &CancellationToken,
) -> ParleyResult<AssistantTurn>
where
    S: Stream<Item = StreamEvent>,
{
    let mut events = std::pin::pin!(events);
    let mut acc = TurnAccumulator::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ParleyError::Cancelled),
            next = events.next() => next,
        };
        match next {
            Some(event) => {
                if let Some(turn) = acc.apply(event, observer)? {
                    return Ok(turn);
                }
            }
            None => {
                return Err(ParleyError::Transport(
                    "event stream ended before the turn finished".to_string(),
                ))
            }
        }
    }
}
