//! End-to-end delivery through the HTTP submission client

use std::io;
use std::sync::Arc;
use std::time::Duration;

use faultline_client::{ClientError, ReportClient, SendOutcome};
use faultline_core::config::ConfigBuilder;
use faultline_core::ports::IOfflineStore;
use faultline_transport::SubmissionClient;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{client_for, in_memory_store, OBJECT_ID};

const VALID_TOKEN: &str = "valid-token";

async fn setup_collector() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/post"))
        .and(query_param("format", "json"))
        .and(query_param("token", VALID_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": OBJECT_ID
        })))
        .mount(&server)
        .await;
    server
}

fn http_delivery(server: &MockServer, token: &str) -> Arc<SubmissionClient> {
    Arc::new(
        SubmissionClient::new(&server.uri(), token, Duration::from_secs(2))
            .expect("build submission client"),
    )
}

#[tokio::test]
async fn test_valid_token_round_trip() {
    let server = setup_collector().await;
    let (_pool, store) = in_memory_store().await;
    let (client, recorder) = client_for(http_delivery(&server, VALID_TOKEN), store.clone());

    let error = io::Error::new(io::ErrorKind::Other, "boom");
    assert!(client.send_message("hello").await.is_delivered());
    assert!(client.send_error(&error).await.is_delivered());

    assert_eq!(recorder.responses().len(), 2);
    assert!(recorder
        .responses()
        .iter()
        .all(|r| r.object.as_deref() == Some(OBJECT_ID)));
    assert_eq!(store.count().await.unwrap(), 0);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["message"], "hello");
    assert_eq!(body["agent"], "faultline");
}

#[tokio::test]
async fn test_refused_token_is_rejected_not_queued() {
    let server = setup_collector().await;
    let (_pool, store) = in_memory_store().await;
    let (client, recorder) = client_for(http_delivery(&server, "bad-token"), store.clone());

    let outcome = client.send_message("hello").await;

    assert!(matches!(
        outcome,
        SendOutcome::Rejected(ClientError::ServerRejected(_))
    ));
    assert_eq!(recorder.errors().len(), 1);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_outage_queues_then_delivers_after_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (_pool, store) = in_memory_store().await;
    let (client, recorder) = client_for(http_delivery(&server, VALID_TOKEN), store.clone());

    assert!(client.send_message("during outage").await.is_queued());
    assert_eq!(store.count().await.unwrap(), 1);

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": OBJECT_ID
        })))
        .mount(&server)
        .await;

    let summary = client.flush().await.unwrap();

    assert_eq!(summary.delivered, 1);
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(recorder.responses().len(), 1);
    assert_eq!(recorder.errors().len(), 1);
}

#[tokio::test]
async fn test_client_from_config_persists_offline_reports() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let config = ConfigBuilder::new()
        .endpoint_host(server.uri())
        .endpoint_token(VALID_TOKEN)
        .offline_database_path(dir.path().join("offline.db"))
        .build_validated()
        .unwrap();

    let client = ReportClient::from_config(&config).await.unwrap();
    assert!(client.send_message("kept on disk").await.is_queued());
    client.shutdown().await;

    let reopened = ReportClient::from_config(&config).await.unwrap();
    assert_eq!(reopened.store().count().await.unwrap(), 1);
    reopened.shutdown().await;
}

#[tokio::test]
async fn test_client_from_config_applies_rate_limit_and_timeout() {
    let server = setup_collector().await;
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&slow)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let limited = ConfigBuilder::new()
        .endpoint_host(server.uri())
        .endpoint_token(VALID_TOKEN)
        .rate_limiting_reports_per_minute(1)
        .rate_limiting_window_secs(3600)
        .offline_database_path(dir.path().join("limited.db"))
        .build_validated()
        .unwrap();
    let client = ReportClient::from_config(&limited).await.unwrap();

    assert!(client.send_message("first").await.is_delivered());
    assert!(matches!(
        client.send_message("second").await,
        SendOutcome::Rejected(ClientError::RateLimited { .. })
    ));
    client.shutdown().await;

    let timed = ConfigBuilder::new()
        .endpoint_host(slow.uri())
        .endpoint_token(VALID_TOKEN)
        .endpoint_request_timeout_secs(1)
        .offline_database_path(dir.path().join("timed.db"))
        .build_validated()
        .unwrap();
    let client = ReportClient::from_config(&timed).await.unwrap();

    assert!(client.send_message("slow endpoint").await.is_queued());
    assert_eq!(client.store().count().await.unwrap(), 1);
    client.shutdown().await;
}
