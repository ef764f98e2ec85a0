//! LlmClient over HTTP against a mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use parley_agent::{
    CancellationToken, FinishReason, LlmBackend, LlmClient, LlmProvider, ModelConfig,
    NoopObserver,
};
use parley_core::{Message, ParleyError};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(provider: LlmProvider, server: &MockServer, key: Option<&str>) -> ModelConfig {
    let mut config = ModelConfig::new(provider);
    config.api_base_url = Some(server.uri());
    config.api_key = key.map(str::to_string);
    config
}

#[tokio::test]
async fn test_event_stream_turn_with_bearer() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"hmm\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({"model": "deepseek-chat", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::DeepSeek, &server, Some("sk-test")));
    let messages = vec![Message::system("sys"), Message::user("hi")];
    let turn = client
        .complete(None, &messages, &[], &mut NoopObserver, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(turn.content, "Hello");
    assert_eq!(turn.reasoning, "hmm");
    assert_eq!(turn.finish_reason, FinishReason::Stop);
}

#[tokio::test]
async fn test_line_delimited_turn_without_credential() {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Hi\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::Ollama, &server, None));
    let messages = vec![Message::system("sys"), Message::user("hello")];
    let turn = client
        .complete(None, &messages, &[], &mut NoopObserver, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(turn.content, "Hi");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_error_status_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::OpenAi, &server, Some("sk-test")));
    let messages = vec![Message::system("sys"), Message::user("hi")];
    let err = client
        .complete(None, &messages, &[], &mut NoopObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ParleyError::Transport(msg) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("upstream exploded"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_one_shot_is_non_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "stream": false,
            "messages": [
                {"role": "system", "content": "Answer with one file name."},
                {"role": "user", "content": "a.rs b.rs"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": "a.rs"},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::OpenAi, &server, Some("sk-test")));
    let answer = client
        .one_shot("Answer with one file name.", "a.rs b.rs")
        .await
        .unwrap();
    assert_eq!(answer, "a.rs");
}

#[tokio::test]
async fn test_error_payload_in_stream() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"rate limited\"}}\n\n",
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(LlmProvider::OpenAi, &server, Some("sk-test")));
    let messages = vec![Message::system("sys"), Message::user("hi")];
    let err = client
        .complete(None, &messages, &[], &mut NoopObserver, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Transport(m) if m == "rate limited"));
}
