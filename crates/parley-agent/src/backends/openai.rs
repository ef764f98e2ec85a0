use super::{build_messages, error_message, ChatRequest, FrameDecoder, ProtocolAdapter};
use crate::framing::MalformedFrame;
use crate::stream::{FinishReason, StreamEvent};
use parley_core::{Message, ParleyError, ParleyResult};
use parley_tools::ToolDescriptor;

/// OpenAI-compatible chat completions ("delta" event-stream protocol).
///
/// Works with OpenAI, DeepSeek and any other provider that implements the
/// chat completions API, including DeepSeek's `reasoning_content` channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn assistant_entry(m: &Message) -> serde_json::Value {
    if !m.has_tool_calls() {
        return serde_json::json!({
            "role": "assistant",
            "content": m.text()
        });
    }

    let tool_calls: Vec<serde_json::Value> = m
        .tool_calls
        .iter()
        .map(|c| {
            serde_json::json!({
                "id": c.id,
                "type": "function",
                "function": {
                    "name": c.name,
                    "arguments": c.arguments,
                }
            })
        })
        .collect();

    serde_json::json!({
        "role": "assistant",
        "content": m.content,
        "tool_calls": tool_calls
    })
}

impl ProtocolAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn build_body(&self, request: &ChatRequest<'_>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": build_messages(request, assistant_entry),
            "stream": request.stream,
        });

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> =
                request.tools.iter().map(ToolDescriptor::function_schema).collect();
            body["tools"] = serde_json::Value::Array(tools);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    fn decoder(&self) -> Box<dyn FrameDecoder> {
        Box::new(EventStreamDecoder::default())
    }

    fn decode_response(&self, body: &serde_json::Value) -> ParleyResult<Vec<StreamEvent>> {
        if let Some(err) = body.get("error") {
            return Err(ParleyError::Transport(error_message(err)));
        }
        let choice = &body["choices"][0];
        if choice.is_null() {
            return Err(ParleyError::Transport("response carries no choices".into()));
        }
        let message = &choice["message"];
        let mut events = Vec::new();

        if let Some(reasoning) = non_empty(&message["reasoning_content"]) {
            events.push(StreamEvent::reasoning(reasoning));
        }
        if let Some(content) = non_empty(&message["content"]) {
            events.push(StreamEvent::content(content));
        }

        let calls = message["tool_calls"].as_array().map(Vec::as_slice).unwrap_or_default();
        for (pos, tc) in calls.iter().enumerate() {
            let index = u32::try_from(pos).unwrap_or(u32::MAX);
            let id = non_empty(&tc["id"])
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{index}"));
            let name = tc["function"]["name"].as_str().unwrap_or_default();
            let arguments = match &tc["function"]["arguments"] {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "{}".to_string(),
                other => other.to_string(),
            };
            events.push(StreamEvent::tool_started(index, id, name));
            events.push(StreamEvent::tool_args(index, arguments));
        }

        let reason = match choice["finish_reason"].as_str() {
            Some(fr) => FinishReason::from_wire(fr),
            None if !calls.is_empty() => FinishReason::ToolCalls,
            None => FinishReason::Stop,
        };
        events.push(StreamEvent::finished(reason));
        Ok(events)
    }
}

/// Line decoder for `data: {...}` frames terminated by `data: [DONE]`.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    saw_tool_call: bool,
}

impl EventStreamDecoder {
    fn decode_chunk(&mut self, chunk: &serde_json::Value) -> Vec<StreamEvent> {
        if let Some(err) = chunk.get("error") {
            return vec![StreamEvent::finished(FinishReason::Error(error_message(err)))];
        }

        let choice = &chunk["choices"][0];
        let delta = &choice["delta"];
        let mut events = Vec::new();

        if let Some(reasoning) = non_empty(&delta["reasoning_content"]) {
            events.push(StreamEvent::reasoning(reasoning));
        }
        if let Some(content) = non_empty(&delta["content"]) {
            events.push(StreamEvent::content(content));
        }

        if let Some(tc_array) = delta["tool_calls"].as_array() {
            for (pos, tc) in tc_array.iter().enumerate() {
                let index = tc["index"]
                    .as_u64()
                    .and_then(|i| u32::try_from(i).ok())
                    .unwrap_or_else(|| u32::try_from(pos).unwrap_or(u32::MAX));
                let id = non_empty(&tc["id"]);
                let name = non_empty(&tc["function"]["name"]);

                // A name or id marks the start of a call; later fragments carry neither.
                if id.is_some() || name.is_some() {
                    self.saw_tool_call = true;
                    events.push(StreamEvent::tool_started(
                        index,
                        id.map(str::to_string)
                            .unwrap_or_else(|| format!("call_{index}")),
                        name.unwrap_or_default(),
                    ));
                }
                if let Some(args_delta) = non_empty(&tc["function"]["arguments"]) {
                    events.push(StreamEvent::tool_args(index, args_delta));
                }
            }
        }

        if let Some(fr) = choice["finish_reason"].as_str() {
            events.push(StreamEvent::finished(FinishReason::from_wire(fr)));
        }

        events
    }
}

impl FrameDecoder for EventStreamDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Vec<StreamEvent>, MalformedFrame> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return Ok(Vec::new());
        }

        // `event:`, `id:` and `retry:` fields carry nothing we use.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(Vec::new());
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            return Ok(vec![StreamEvent::finished(self.implicit_finish())]);
        }

        let chunk: serde_json::Value =
            serde_json::from_str(data).map_err(|e| MalformedFrame::new(line, e))?;
        Ok(self.decode_chunk(&chunk))
    }

    fn implicit_finish(&self) -> FinishReason {
        if self.saw_tool_call {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        }
    }
}

fn non_empty(value: &serde_json::Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}
