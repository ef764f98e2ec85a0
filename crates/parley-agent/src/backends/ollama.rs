use super::{build_messages, error_message, ChatRequest, FrameDecoder, ProtocolAdapter};
use crate::framing::MalformedFrame;
use crate::stream::{FinishReason, StreamEvent};
use parley_core::{Message, ParleyError, ParleyResult};
use parley_tools::ToolDescriptor;

/// Ollama's native `/api/chat` (line-delimited JSON objects).
///
/// There is no reasoning channel and tool calls arrive whole, usually on the
/// final line. Calls carry no ids, so they are numbered `call_<n>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OllamaAdapter;

impl OllamaAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn assistant_entry(m: &Message) -> serde_json::Value {
    let mut entry = serde_json::json!({
        "role": "assistant",
        "content": m.text()
    });
    if m.has_tool_calls() {
        // Ollama expects arguments as an object, not as JSON text.
        let tool_calls: Vec<serde_json::Value> = m
            .tool_calls
            .iter()
            .map(|c| {
                let arguments = c
                    .parse_arguments()
                    .unwrap_or_else(|_| serde_json::json!({}));
                serde_json::json!({
                    "function": {
                        "name": c.name,
                        "arguments": arguments,
                    }
                })
            })
            .collect();
        entry["tool_calls"] = serde_json::Value::Array(tool_calls);
    }
    entry
}

impl ProtocolAdapter for OllamaAdapter {
    fn name(&self) -> &'static str {
        "ollama"
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

        let mut options = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            options.insert("temperature".into(), serde_json::json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".into(), serde_json::json!(max_tokens));
        }
        if !options.is_empty() {
            body["options"] = serde_json::Value::Object(options);
        }

        body
    }

    fn decoder(&self) -> Box<dyn FrameDecoder> {
        Box::new(LineDelimitedDecoder::default())
    }

    fn decode_response(&self, body: &serde_json::Value) -> ParleyResult<Vec<StreamEvent>> {
        if let Some(err) = body.get("error") {
            return Err(ParleyError::Transport(error_message(err)));
        }
        let mut decoder = LineDelimitedDecoder::default();
        let mut events = decoder.decode_object(body);
        if !events.last().is_some_and(StreamEvent::is_finish) {
            events.push(StreamEvent::finished(decoder.implicit_finish()));
        }
        Ok(events)
    }
}

/// Line decoder for `{"message": {...}, "done": bool}` objects.
#[derive(Debug, Default)]
pub struct LineDelimitedDecoder {
    next_index: u32,
}

impl LineDelimitedDecoder {
    fn decode_object(&mut self, value: &serde_json::Value) -> Vec<StreamEvent> {
        if let Some(err) = value.get("error") {
            return vec![StreamEvent::finished(FinishReason::Error(error_message(err)))];
        }

        let message = &value["message"];
        let mut events = Vec::new();

        if let Some(content) = message["content"].as_str().filter(|s| !s.is_empty()) {
            events.push(StreamEvent::content(content));
        }

        if let Some(calls) = message["tool_calls"].as_array() {
            for tc in calls {
                let index = self.next_index;
                self.next_index += 1;

                let id = tc["id"]
                    .as_str()
                    .filter(|s| !s.is_empty())
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
        }

        if value["done"].as_bool() == Some(true) {
            let reason = if self.next_index > 0 {
                FinishReason::ToolCalls
            } else if value["done_reason"].as_str() == Some("length") {
                FinishReason::Length
            } else {
                FinishReason::Stop
            };
            events.push(StreamEvent::finished(reason));
        }

        events
    }
}

impl FrameDecoder for LineDelimitedDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Vec<StreamEvent>, MalformedFrame> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Vec::new());
        }
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| MalformedFrame::new(line, e))?;
        Ok(self.decode_object(&value))
    }

    fn implicit_finish(&self) -> FinishReason {
        if self.next_index > 0 {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        }
    }
}
