//! HTTP behaviour of the OpenAI clients against a mock server.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vault_agent::config::{ReasoningEffort, TextVerbosity};
use vault_agent::memory::{EmbeddingProvider, OpenAiEmbeddingProvider};
use vault_agent::providers::{
    CompletionClient, CompletionSettings, InputItem, OpenAiResponsesProvider, ProviderError,
};

fn embedder(server: &MockServer) -> OpenAiEmbeddingProvider {
    OpenAiEmbeddingProvider::new(
        "sk-test".into(),
        Some(format!("{}/v1/", server.uri())),
        Some("text-embedding-3-small".into()),
    )
}

fn client(server: &MockServer) -> CompletionClient {
    let provider = Arc::new(OpenAiResponsesProvider::new(
        "sk-test".into(),
        Some(format!("{}/v1", server.uri())),
    ));
    CompletionClient::new(
        provider,
        CompletionSettings {
            model: "gpt-5-nano".into(),
            reasoning_effort: ReasoningEffort::Low,
            text_verbosity: TextVerbosity::Medium,
        },
    )
}

#[tokio::test]
async fn test_embeddings_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "encoding_format": "float",
            "input": ["alpha", "beta"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 0, "embedding": [0.1, 0.2]},
                {"index": 1, "embedding": [0.3, 0.4]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = embedder(&server)
        .embed(&["alpha".to_string(), "beta".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
}

#[tokio::test]
async fn test_embeddings_empty_input_skips_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let vectors = embedder(&server).embed(&[]).await.unwrap();
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn test_embeddings_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided"}
        })))
        .mount(&server)
        .await;

    let err = embedder(&server).embed_one("alpha").await.unwrap_err();
    assert!(matches!(err, ProviderError::Unauthorized { status: 401, .. }));
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_embeddings_rate_limited_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let err = embedder(&server).embed_one("alpha").await.unwrap_err();
    match &err {
        ProviderError::RateLimited {
            retry_after_secs, ..
        } => assert_eq!(*retry_after_secs, Some(7)),
        other => panic!("expected rate limit, got {other:?}"),
    }
    assert!(err.to_string().contains("retry after 7s"));
}

#[tokio::test]
async fn test_embeddings_server_error_uses_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "upstream overloaded"}
        })))
        .mount(&server)
        .await;

    let err = embedder(&server).embed_one("alpha").await.unwrap_err();
    match err {
        ProviderError::ServiceError { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream overloaded");
        }
        other => panic!("expected service error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_embeddings_count_mismatch_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [1.0]}]
        })))
        .mount(&server)
        .await;

    let err = embedder(&server)
        .embed(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_responses_thread_previous_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(body_partial_json(json!({"previous_response_id": "resp_abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_def",
            "output": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(body_partial_json(json!({
            "model": "gpt-5-nano",
            "store": true,
            "stream": false,
            "parallel_tool_calls": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_abc",
            "output": [{
                "type": "function_call",
                "call_id": "call_1",
                "name": "list_files",
                "arguments": "{}"
            }],
            "usage": {"input_tokens": 12, "output_tokens": 3}
        })))
        .mount(&server)
        .await;

    let mut client = client(&server);
    let body = client
        .send(vec![InputItem::user("hello")], &[])
        .await
        .unwrap();
    assert_eq!(body.id, "resp_abc");
    assert_eq!(body.output.len(), 1);
    assert_eq!(body.usage.as_ref().map(|u| u.input_tokens), Some(12));
    assert_eq!(client.previous_response_id(), Some("resp_abc"));

    let second = client
        .send(vec![InputItem::user("again")], &[])
        .await
        .unwrap();
    assert_eq!(second.id, "resp_def");
    assert_eq!(client.previous_response_id(), Some("resp_def"));
}

#[tokio::test]
async fn test_responses_unauthorized_keeps_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let mut client = client(&server);
    let err = client
        .send(vec![InputItem::user("hello")], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unauthorized { .. }));
    assert_eq!(client.previous_response_id(), None);
}
