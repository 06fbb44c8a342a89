//! Gemini client against a mock HTTP server.

use image::DynamicImage;
use serde_json::json;
use sidequest::capture::Frame;
use sidequest::config::PromptConfig;
use sidequest::inference::{GeminiClient, GeminiConfig, InferenceClient};
use sidequest::jobs::JobTicket;
use sidequest::test_utils::FakeFrames;
use sidequest::{JobKind, JobRunner, OverlayError};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig::new("test-key", "gemini-2.5-flash").with_base_url(server.uri()))
}

fn frame() -> Frame {
    Frame::from_image(DynamicImage::new_rgb8(64, 36), 32, 18)
}

fn text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn sends_prompt_image_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(
            "  A goblin sneaks behind the tavern.\n",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).infer("Describe", &frame()).await.unwrap();
    assert_eq!(text, "A goblin sneaks behind the tavern.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "Describe");
    assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
    assert!(!parts[1]["inline_data"]["data"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn rate_limit_maps_to_inference_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).infer("Describe", &frame()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "inference failed: rate limited: Resource has been exhausted"
    );
}

#[tokio::test]
async fn bad_key_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "API key not valid" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).infer("Describe", &frame()).await.unwrap_err();
    assert!(matches!(err, OverlayError::Inference(ref m) if m.starts_with("authentication failed")));
}

#[tokio::test]
async fn empty_candidates_are_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client(&server).infer("Describe", &frame()).await.unwrap_err();
    assert_eq!(err.to_string(), "inference failed: empty response");
}

#[tokio::test]
async fn blocked_prompt_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).infer("Describe", &frame()).await.unwrap_err();
    assert_eq!(err.to_string(), "inference failed: prompt blocked: SAFETY");
}

#[tokio::test]
async fn slow_provider_times_out_through_runner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_response("too late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let runner = JobRunner::new(
        Arc::new(FakeFrames::new()),
        Arc::new(client(&server)),
        PromptConfig::default(),
        Duration::from_secs(1),
    );
    let result = runner.run(JobTicket::new(JobKind::Narration)).await;
    assert!(!result.is_success());
    assert_eq!(result.text, "Error: inference timed out after 1s");
}

#[tokio::test]
async fn server_error_text_reaches_job_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let runner = JobRunner::new(
        Arc::new(FakeFrames::new()),
        Arc::new(client(&server)),
        PromptConfig::default(),
        Duration::from_secs(5),
    );
    let result = runner.run(JobTicket::new(JobKind::VillagerLine)).await;
    assert_eq!(
        result.text,
        "Error: inference failed: HTTP 500: upstream exploded"
    );
}
