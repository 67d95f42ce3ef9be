//! Integration tests for SubmissionClient against a mock collector
//!
//! Verifies the wire call (method, path, query, body) and the
//! classification of success, rejection and transient failures.

use std::time::Duration;

use faultline_core::domain::SubmissionResult;
use faultline_core::ports::{DeliveryOutcome, IReportDelivery};
use faultline_transport::client::SubmissionClient;
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_valid_token_returns_object_id() {
    let server = common::setup_collector("aaa").await;
    let client = common::client_for(&server, common::VALID_TOKEN);

    let outcome = client.submit(&common::sample_payload()).await;

    assert_eq!(outcome, DeliveryOutcome::Success(SubmissionResult::ok("aaa")));
}

#[tokio::test]
async fn test_posts_payload_as_json_body() {
    let server = MockServer::start().await;
    let payload = common::sample_payload();

    Mock::given(method("POST"))
        .and(path("/post"))
        .and(header("content-type", "application/json"))
        .and(body_bytes(payload.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "bbb"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client_for(&server, "t");
    assert!(client.submit(&payload).await.is_success());
}

#[tokio::test]
async fn test_invalid_token_rejected_with_server_message() {
    let server = common::setup_fixed_response(
        ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "invalid token"
        })),
    )
    .await;
    let client = common::client_for(&server, "wrong");

    let outcome = client.submit(&common::sample_payload()).await;

    assert_eq!(outcome, DeliveryOutcome::ServerRejected("invalid token".into()));
}

#[tokio::test]
async fn test_unmatched_token_is_not_retried() {
    // the collector only knows VALID_TOKEN; wiremock answers 404 otherwise
    let server = common::setup_collector("aaa").await;
    let client = common::client_for(&server, "unknown");

    let outcome = client.submit(&common::sample_payload()).await;

    assert!(matches!(outcome, DeliveryOutcome::ServerRejected(_)));
}

#[tokio::test]
async fn test_service_unavailable_is_transient() {
    let server = common::setup_fixed_response(ResponseTemplate::new(503)).await;
    let client = common::client_for(&server, "t");

    let outcome = client.submit(&common::sample_payload()).await;

    assert!(outcome.is_retryable(), "got {outcome:?}");
}

#[tokio::test]
async fn test_throttled_is_transient() {
    let server = common::setup_fixed_response(
        ResponseTemplate::new(429).insert_header("Retry-After", "30"),
    )
    .await;
    let client = common::client_for(&server, "t");

    assert!(client.submit(&common::sample_payload()).await.is_retryable());
}

#[tokio::test]
async fn test_malformed_success_body_is_transient() {
    let server = common::setup_fixed_response(
        ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
    )
    .await;
    let client = common::client_for(&server, "t");

    let outcome = client.submit(&common::sample_payload()).await;

    match outcome {
        DeliveryOutcome::TransientFailure(message) => assert!(message.contains("malformed")),
        other => panic!("expected transient failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = common::setup_fixed_response(
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({ "object": "late" }))
            .set_delay(Duration::from_secs(5)),
    )
    .await;
    let client = SubmissionClient::new(&server.uri(), "t", Duration::from_millis(200)).unwrap();

    let outcome = client.submit(&common::sample_payload()).await;

    match outcome {
        DeliveryOutcome::TransientFailure(message) => assert!(message.contains("timed out")),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_host_is_transient() {
    // reserve a free port, then release it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = SubmissionClient::new(&uri, "t", Duration::from_secs(2)).unwrap();
    let outcome = client.submit(&common::sample_payload()).await;

    assert!(outcome.is_retryable(), "got {outcome:?}");
}
