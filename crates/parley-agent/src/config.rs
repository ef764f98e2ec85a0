use parley_core::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};

const OLLAMA_CHAT_PATH: &str = "/api/chat";

/// Backend family. Selected once, from the environment or a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// DeepSeek cloud API (event-stream, reasoning channel).
    DeepSeek,
    /// OpenAI chat completions (event-stream).
    OpenAi,
    /// Local Ollama server (line-delimited JSON). No credential needed.
    Ollama,
}

/// How a backend frames its streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `data: {...}` lines ending with `data: [DONE]`.
    EventStream,
    /// One JSON object per line, the last one flagged `done: true`.
    LineDelimited,
}

impl LlmProvider {
    pub fn wire_format(&self) -> WireFormat {
        match self {
            LlmProvider::DeepSeek | LlmProvider::OpenAi => WireFormat::EventStream,
            LlmProvider::Ollama => WireFormat::LineDelimited,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::DeepSeek => "https://api.deepseek.com",
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::DeepSeek => "deepseek-chat",
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Ollama => "deepseek-coder:6.7b",
        }
    }
}

/// What the runner does when the backend calls a tool nobody registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownToolPolicy {
    /// Skip the call without appending a tool result.
    #[default]
    Skip,
    /// Append an `ERROR: unknown tool` result so every call gets an answer.
    ErrorResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: u32,
    #[serde(default)]
    pub unknown_tool_policy: UnknownToolPolicy,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_stream() -> bool {
    true
}

fn default_max_round_trips() -> u32 {
    10
}

fn default_system_prompt() -> String {
    "You are a helpful assistant".to_string()
}

impl ModelConfig {
    /// Config for `provider` with its default model and endpoint.
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            provider,
            model_id: provider.default_model().to_string(),
            api_key: None,
            api_base_url: None,
            temperature: None,
            max_tokens: None,
            stream: default_stream(),
            max_round_trips: default_max_round_trips(),
            unknown_tool_policy: UnknownToolPolicy::default(),
            system_prompt: default_system_prompt(),
        }
    }

    /// Selects the backend from the process environment.
    ///
    /// `DEEPSEEK_API_KEY` wins over `OPENAI_API_KEY`; with neither set the
    /// local Ollama backend is used, at `OLLAMA_HOST` when given.
    /// `PARLEY_MODEL` overrides the model id.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`ModelConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = if let Some(key) = var("DEEPSEEK_API_KEY") {
            let mut c = Self::new(LlmProvider::DeepSeek);
            c.api_key = Some(key);
            c
        } else if let Some(key) = var("OPENAI_API_KEY") {
            let mut c = Self::new(LlmProvider::OpenAi);
            c.api_key = Some(key);
            c
        } else {
            let mut c = Self::new(LlmProvider::Ollama);
            c.api_base_url = var("OLLAMA_HOST");
            c
        };

        if let Some(model) = var("PARLEY_MODEL") {
            config.model_id = model;
        }
        config
    }

    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    /// Full chat endpoint for the configured wire format.
    ///
    /// A base without a scheme (`host:port`, as Ollama accepts it) is taken
    /// as plain `http`. A line-delimited base that already names the chat
    /// path is used as the endpoint unchanged.
    pub fn endpoint(&self) -> String {
        let base = self.base_url();
        let base = if base.contains("://") {
            base.to_string()
        } else {
            format!("http://{base}")
        };
        match self.provider.wire_format() {
            WireFormat::EventStream => format!("{base}/chat/completions"),
            WireFormat::LineDelimited if base.ends_with(OLLAMA_CHAT_PATH) => base,
            WireFormat::LineDelimited => format!("{base}{OLLAMA_CHAT_PATH}"),
        }
    }

    /// Rejects settings the runner cannot work with.
    pub fn validate(&self) -> ParleyResult<()> {
        if self.max_round_trips == 0 {
            return Err(ParleyError::Config(
                "max_round_trips must be at least 1".to_string(),
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err(ParleyError::Config("model_id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Credential to send, if any. Blank keys count as unauthenticated.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_deepseek_wins_over_openai() {
        let config = ModelConfig::from_lookup(lookup(&[
            ("DEEPSEEK_API_KEY", "ds-key"),
            ("OPENAI_API_KEY", "oa-key"),
        ]));
        assert_eq!(config.provider, LlmProvider::DeepSeek);
        assert_eq!(config.credential(), Some("ds-key"));
        assert_eq!(config.endpoint(), "https://api.deepseek.com/chat/completions");
    }

    #[test]
    fn test_openai_selected_from_key() {
        let config = ModelConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "oa-key")]));
        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_local_fallback_without_credentials() {
        let config = ModelConfig::from_lookup(lookup(&[]));
        assert_eq!(config.provider, LlmProvider::Ollama);
        assert!(config.credential().is_none());
        assert_eq!(config.endpoint(), "http://localhost:11434/api/chat");
        assert_eq!(config.model_id, "deepseek-coder:6.7b");
    }

    #[test]
    fn test_ollama_host_overrides_base_url() {
        let config = ModelConfig::from_lookup(lookup(&[
            ("OLLAMA_HOST", "http://gpu-box:11434/"),
            ("PARLEY_MODEL", "qwen2.5:7b"),
        ]));
        assert_eq!(config.endpoint(), "http://gpu-box:11434/api/chat");
        assert_eq!(config.model_id, "qwen2.5:7b");
    }

    #[test]
    fn test_ollama_host_as_full_endpoint() {
        let config = ModelConfig::from_lookup(lookup(&[(
            "OLLAMA_HOST",
            "http://localhost:11434/api/chat/",
        )]));
        assert_eq!(config.endpoint(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_ollama_host_without_scheme() {
        let config = ModelConfig::from_lookup(lookup(&[("OLLAMA_HOST", "127.0.0.1:11434")]));
        assert_eq!(config.endpoint(), "http://127.0.0.1:11434/api/chat");

        let config = ModelConfig::from_lookup(lookup(&[("OLLAMA_HOST", "gpu-box:11434/api/chat")]));
        assert_eq!(config.endpoint(), "http://gpu-box:11434/api/chat");
    }

    #[test]
    fn test_validate_rejects_zero_round_trips() {
        let mut config = ModelConfig::new(LlmProvider::OpenAi);
        assert!(config.validate().is_ok());
        config.max_round_trips = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ParleyError::Config(m) if m.contains("max_round_trips")));
    }

    #[test]
    fn test_blank_key_is_ignored() {
        let config = ModelConfig::from_lookup(lookup(&[("DEEPSEEK_API_KEY", "  ")]));
        assert_eq!(config.provider, LlmProvider::Ollama);
    }
}
