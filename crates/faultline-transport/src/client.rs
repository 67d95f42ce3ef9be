//! Report submission client
//!
//! POSTs serialized reports to `{host}/post?format=json&token={token}` and
//! turns whatever happens into a [`DeliveryOutcome`]. Nothing in here
//! returns an error for a failed submission.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use faultline_core::ports::IReportDelivery;
//! use faultline_transport::client::SubmissionClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = SubmissionClient::new("https://submit.example.com/", "token", Duration::from_secs(15))?;
//! let outcome = client.submit(br#"{"message":"hello"}"#).await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use faultline_core::domain::{ResultStatus, SubmissionResult};
use faultline_core::ports::{DeliveryOutcome, IReportDelivery};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::TransportError;

/// Default upper bound for one submission
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Body returned by the collection endpoint
#[derive(Debug, Deserialize)]
struct ServerResponse {
    object: Option<String>,
    message: Option<String>,
}

// ============================================================================
// SubmissionClient
// ============================================================================

/// HTTP adapter for [`IReportDelivery`]
///
/// Every request carries the client-wide timeout, so a submission can never
/// hang indefinitely.
pub struct SubmissionClient {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl SubmissionClient {
    /// Creates a client for `host` authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Fails when `host` is not an http(s) URL or the HTTP client cannot be
    /// built.
    pub fn new(host: &str, token: &str, timeout: Duration) -> Result<Self, TransportError> {
        let url = Self::submission_url(host, token)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("faultline/", env!("CARGO_PKG_VERSION")))
            .build()?;

        debug!(url = %redact(&url), timeout_ms = timeout.as_millis() as u64, "Submission client created");

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    /// Builds `{host}/post?format=json&token={token}`.
    ///
    /// A missing trailing slash on `host` is tolerated, so both
    /// `https://h/api` and `https://h/api/` submit to `https://h/api/post`.
    pub fn submission_url(host: &str, token: &str) -> Result<Url, TransportError> {
        let mut base = Url::parse(host)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(TransportError::UnsupportedScheme(base.scheme().to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut url = base.join("post")?;
        url.query_pairs_mut()
            .clear()
            .append_pair("format", "json")
            .append_pair("token", token);
        Ok(url)
    }

    /// Full submission URL, token included
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for SubmissionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionClient")
            .field("url", &redact(&self.url).to_string())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Copy of `url` with the token query value masked, for logs.
fn redact(url: &Url) -> Url {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted
}

// ============================================================================
// Outcome classification
// ============================================================================

/// Statuses worth retrying later: timeouts, throttling, server failures.
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
    ) || status.is_server_error()
}

/// Maps an HTTP status and body to a delivery outcome.
pub(crate) fn classify(status: StatusCode, body: &[u8]) -> DeliveryOutcome {
    let parsed = serde_json::from_slice::<ServerResponse>(body);

    if status.is_success() {
        return match parsed {
            Ok(ServerResponse {
                object: Some(object),
                message,
            }) => DeliveryOutcome::Success(SubmissionResult {
                object: Some(object),
                status: ResultStatus::Ok,
                message,
            }),
            Ok(_) => DeliveryOutcome::TransientFailure(format!(
                "{status}: response has no object identifier"
            )),
            Err(e) => DeliveryOutcome::TransientFailure(format!("{status}: malformed response: {e}")),
        };
    }

    let message = parsed
        .ok()
        .and_then(|r| r.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());

    if is_retryable_status(status) {
        DeliveryOutcome::TransientFailure(format!("{status}: {message}"))
    } else if status.is_client_error() {
        DeliveryOutcome::ServerRejected(message)
    } else {
        DeliveryOutcome::TransientFailure(format!("unexpected status {status}: {message}"))
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        format!("request failed: {e}")
    }
}

#[async_trait::async_trait]
impl IReportDelivery for SubmissionClient {
    async fn submit(&self, payload: &[u8]) -> DeliveryOutcome {
        let response = match self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let reason = describe_request_error(&e);
                warn!(url = %redact(&self.url), error = %reason, "Report submission failed");
                return DeliveryOutcome::TransientFailure(reason);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let reason = describe_request_error(&e);
                warn!(status = status.as_u16(), error = %reason, "Failed to read submission response");
                return DeliveryOutcome::TransientFailure(reason);
            }
        };

        let outcome = classify(status, &body);
        match &outcome {
            DeliveryOutcome::Success(result) => {
                debug!(status = status.as_u16(), object = ?result.object, "Report accepted");
            }
            DeliveryOutcome::ServerRejected(message) => {
                warn!(status = status.as_u16(), %message, "Report rejected by server");
            }
            DeliveryOutcome::TransientFailure(message) => {
                warn!(status = status.as_u16(), %message, "Report submission will be retried");
            }
        }
        outcome
    }
}
