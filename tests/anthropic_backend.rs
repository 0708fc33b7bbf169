//! Integration tests for the Anthropic Messages API backend against a mock
//! HTTP server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use futures::StreamExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use plansmith::{
    AnthropicBackend, Config, Error, GenerationBackend, GenerationRequest, StreamEvent, TokenUsage,
};

fn backend_for(server: &MockServer) -> AnthropicBackend {
    AnthropicBackend::new(Arc::new(Config {
        api_key: Some("sk-test".to_string()),
        api_base_url: server.uri(),
        ..Default::default()
    }))
}

fn request() -> GenerationRequest {
    GenerationRequest {
        role: "MarketResearcher".to_string(),
        model: "claude-sonnet-4-5-20250929".to_string(),
        max_tokens: 5000,
        system: "You are a market researcher.".to_string(),
        user: "Analyze the market for Acme.".to_string(),
    }
}

const SSE_BODY: &str = concat!(
    "event: message_start\n",
    "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":42}}}\n",
    "\n",
    "event: ping\n",
    "data: {\"type\":\"ping\"}\n",
    "\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"## Market\"}}\n",
    "\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\" analysis\"}}\n",
    "\n",
    "event: message_delta\n",
    "data: {\"type\":\"message_delta\",\"usage\":{\"output_tokens\":17}}\n",
    "\n",
    "event: message_stop\n",
    "data: {\"type\":\"message_stop\"}\n",
    "\n",
);

#[tokio::test]
async fn streams_deltas_then_final_accounting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-sonnet-4-5-20250929",
            "max_tokens": 5000,
            "stream": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut stream = backend.stream_generation(request()).await.unwrap();

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }
    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("## Market".to_string()),
            StreamEvent::Delta(" analysis".to_string()),
            StreamEvent::Completed(TokenUsage::new(42, 17)),
        ]
    );
}

#[tokio::test]
async fn system_block_requests_prompt_caching() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(serde_json::json!({
            "system": [{
                "type": "text",
                "text": "You are a market researcher.",
                "cache_control": {"type": "ephemeral"},
            }],
            "messages": [{"role": "user", "content": "Analyze the market for Acme."}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    backend.stream_generation(request()).await.unwrap();
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_string(
                    r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#,
                ),
        )
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    match backend.stream_generation(request()).await {
        Err(Error::RateLimited { retry_after }) => assert_eq!(retry_after, Some(7)),
        Err(e) => panic!("expected RateLimited, got {e}"),
        Ok(_) => panic!("expected RateLimited, got a stream"),
    }
}

#[tokio::test]
async fn invalid_credentials_map_to_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        ))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    match backend.stream_generation(request()).await {
        Err(Error::Authentication(message)) => assert!(message.contains("invalid x-api-key")),
        Err(e) => panic!("expected Authentication, got {e}"),
        Ok(_) => panic!("expected Authentication, got a stream"),
    }
}

#[tokio::test]
async fn server_errors_map_to_service_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"overloaded"}}"#,
        ))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    match backend.stream_generation(request()).await {
        Err(Error::Service { status, message }) => {
            assert_eq!(status, 529);
            assert!(message.contains("overloaded"));
        }
        Err(e) => panic!("expected Service, got {e}"),
        Ok(_) => panic!("expected Service, got a stream"),
    }
}

#[tokio::test]
async fn non_envelope_error_body_falls_back_to_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream proxy error"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    match backend.stream_generation(request()).await {
        Err(Error::Service { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream proxy error");
        }
        Err(e) => panic!("expected Service, got {e}"),
        Ok(_) => panic!("expected Service, got a stream"),
    }
}

#[tokio::test]
async fn missing_credential_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let backend = AnthropicBackend::new(Arc::new(Config {
        api_key: Some("   ".to_string()),
        api_base_url: server.uri(),
        ..Default::default()
    }));
    assert!(matches!(
        backend.stream_generation(request()).await,
        Err(Error::Config { .. })
    ));
}

#[tokio::test]
async fn in_band_error_event_aborts_the_stream() {
    let body = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":5}}}\n",
        "\n",
        "event: error\n",
        "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"busy\"}}\n",
        "\n",
    );
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut stream = backend.stream_generation(request()).await.unwrap();

    match stream.next().await {
        Some(Err(Error::Stream(message))) => assert!(message.contains("overloaded_error")),
        other => panic!("expected stream error, got {other:?}"),
    }
    assert!(stream.next().await.is_none());
}
