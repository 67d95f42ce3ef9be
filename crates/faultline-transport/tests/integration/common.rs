//! Shared test helpers for submission integration tests
//!
//! Provides wiremock-based mock server setup for the collection endpoint.
//! Each helper mounts the necessary mock endpoints and returns a configured
//! SubmissionClient pointing at the mock server.

use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use faultline_transport::client::SubmissionClient;

pub const VALID_TOKEN: &str = "valid-token";

/// Starts a mock collector that accepts `VALID_TOKEN` and answers with
/// object id `object_id`. Any other token gets the server's 404 default.
pub async fn setup_collector(object_id: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/post"))
        .and(query_param("format", "json"))
        .and(query_param("token", VALID_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": object_id
        })))
        .mount(&server)
        .await;

    server
}

/// Starts a mock collector that answers every submission with `response`.
pub async fn setup_fixed_response(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/post"))
        .respond_with(response)
        .mount(&server)
        .await;

    server
}

/// Client for `server` using `token` and a short timeout.
pub fn client_for(server: &MockServer, token: &str) -> SubmissionClient {
    SubmissionClient::new(&server.uri(), token, Duration::from_secs(2))
        .expect("build submission client")
}

pub fn sample_payload() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "uuid": "8a1c1b3e-3c1a-4b5e-9f8e-0e7d2a6c9b10",
        "message": "integration test"
    }))
    .unwrap()
}
