use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{LlmClient, LlmConfig};
use crate::error::LlmError;
use crate::provider::{CompletionProvider, CompletionRequest, FinishReason};

fn client_for(server: &MockServer) -> LlmClient {
    let config = LlmConfig::new("test-key", server.uri())
        .with_model("test-model")
        .with_backoff(Duration::from_millis(1));
    LlmClient::new(config).unwrap()
}

fn reply(content: &str, finish_reason: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{
            "message": { "content": content, "role": "assistant" },
            "finish_reason": finish_reason
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46 }
    }))
}

#[tokio::test]
async fn test_success_on_first_attempt_captures_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(reply("test response", "stop"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).complete(&CompletionRequest::new("hello")).await.unwrap();
    assert_eq!(result.text, "test response");
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert_eq!(result.usage.unwrap().total_tokens, 46);
}

#[tokio::test]
async fn test_structured_mode_sends_json_object_format_and_system() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "max_tokens": 256,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": "critic" },
                { "role": "user", "content": "score this" }
            ]
        })))
        .respond_with(reply("{\"overall\": 8}", "stop"))
        .expect(1)
        .mount(&server)
        .await;

    let request =
        CompletionRequest::new("score this").with_system("critic").with_max_tokens(256).structured();
    let result = client_for(&server).complete(&request).await.unwrap();
    assert_eq!(result.text, "{\"overall\": 8}");
}

#[tokio::test]
async fn test_length_finish_reason_is_reported_as_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply("{\"scenes\": [", "length"))
        .mount(&server)
        .await;

    let result = client_for(&server).complete(&CompletionRequest::new("outline")).await.unwrap();
    assert!(result.finish_reason.is_truncated());
}

#[tokio::test]
async fn test_retry_on_429_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply("success after retry", "stop"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit exceeded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let result = client_for(&server).complete(&CompletionRequest::new("hello")).await.unwrap();
    assert_eq!(result.text, "success after retry");
}

#[tokio::test]
async fn test_retry_on_503_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply("success after 503", "stop"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    let result = client_for(&server).complete(&CompletionRequest::new("hello")).await.unwrap();
    assert_eq!(result.text, "success after 503");
}

#[tokio::test]
async fn test_no_retry_on_401() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&CompletionRequest::new("hello")).await.unwrap_err();
    let err_msg = err.to_string();
    assert!(err_msg.contains("401"));
    assert!(err_msg.contains("Unauthorized"));
}

#[tokio::test]
async fn test_all_retries_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(4)
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&CompletionRequest::new("hello")).await.unwrap_err();
    assert!(matches!(err, LlmError::RetriesExhausted(_)));
    let err_msg = err.to_string();
    assert!(err_msg.contains("503"));
    assert!(err_msg.contains("Service Unavailable"));
}

#[tokio::test]
async fn test_timeout_is_retried_then_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply("late", "stop").set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let config = LlmConfig::new("test-key", server.uri())
        .with_backoff(Duration::from_millis(1))
        .with_max_retries(1)
        .with_timeout(Duration::from_millis(50));
    let client = LlmClient::new(config).unwrap();

    let err = client.complete(&CompletionRequest::new("hello")).await.unwrap_err();
    match err {
        LlmError::RetriesExhausted(inner) => assert!(matches!(*inner, LlmError::Timeout(_))),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_empty_content_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply("   ", "stop"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&CompletionRequest::new("hello")).await.unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}
