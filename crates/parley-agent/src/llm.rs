use crate::accumulator::{collect_turn, AssistantTurn, NoopObserver, TurnObserver};
use crate::backends::ollama::OllamaAdapter;
use crate::backends::openai::OpenAiAdapter;
use crate::backends::{ChatRequest, LlmBackend, ProtocolAdapter};
use crate::config::{ModelConfig, WireFormat};
use crate::framing::{decode_stream, StreamDecoder};
use async_trait::async_trait;
use futures_util::stream;
use parley_core::{Message, ParleyError, ParleyResult};
use parley_tools::ToolDescriptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// HTTP client for one configured backend.
///
/// The protocol adapter is chosen from the provider's wire format when the
/// client is built. Everything after that goes through the adapter.
pub struct LlmClient {
    config: ModelConfig,
    http: reqwest::Client,
    adapter: Box<dyn ProtocolAdapter>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        let adapter: Box<dyn ProtocolAdapter> = match config.provider.wire_format() {
            WireFormat::EventStream => Box::new(OpenAiAdapter::new()),
            WireFormat::LineDelimited => Box::new(OllamaAdapter::new()),
        };
        Self {
            config,
            http: reqwest::Client::new(),
            adapter,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Name of the selected protocol adapter.
    pub fn protocol(&self) -> &'static str {
        self.adapter.name()
    }

    /// Single non-streaming request without tools or history.
    ///
    /// `instruction` is sent as the system message, `prompt` as the only
    /// user message.
    pub async fn one_shot(&self, instruction: &str, prompt: &str) -> ParleyResult<String> {
        let messages = [Message::user(prompt)];
        let request = ChatRequest {
            model: &self.config.model_id,
            system_prompt: Some(instruction),
            messages: &messages,
            tools: &[],
            stream: false,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let turn = self
            .execute(&request, &mut NoopObserver, &CancellationToken::new())
            .await?;
        Ok(turn.content)
    }

    async fn execute(
        &self,
        request: &ChatRequest<'_>,
        observer: &mut dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> ParleyResult<AssistantTurn> {
        let url = self.config.endpoint();
        let body = self.adapter.build_body(request);
        debug!(url = %url, body = %body, "Sending chat request");

        let mut builder = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = self.config.credential() {
            builder = builder.bearer_auth(key);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ParleyError::Cancelled),
            sent = builder.send() => sent
                .map_err(|e| ParleyError::Transport(format!("request to {url} failed: {e}")))?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ParleyError::Transport(format!(
                "{} API error {status}: {text}",
                self.adapter.name()
            )));
        }

        if request.stream {
            let decoder = StreamDecoder::new(self.adapter.decoder());
            let events = decode_stream(Box::pin(response.bytes_stream()), decoder);
            return collect_turn(events, observer, cancel).await;
        }

        let body: serde_json::Value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ParleyError::Cancelled),
            json = response.json() => json
                .map_err(|e| ParleyError::Transport(format!("invalid response body: {e}")))?,
        };
        let events = self.adapter.decode_response(&body)?;
        collect_turn(stream::iter(events), observer, cancel).await
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
        observer: &mut dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> ParleyResult<AssistantTurn> {
        let request = ChatRequest {
            model: &self.config.model_id,
            system_prompt,
            messages,
            tools,
            stream: self.config.stream,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let turn = self.execute(&request, observer, cancel).await?;
        info!(
            protocol = self.adapter.name(),
            finish = ?turn.finish_reason,
            tool_calls = turn.tool_calls.len(),
            "Assistant turn finished"
        );
        Ok(turn)
    }
}
