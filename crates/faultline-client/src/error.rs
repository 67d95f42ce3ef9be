//! Client error taxonomy
//!
//! Every failure a caller can observe through the error hook or a
//! [`SendOutcome::Rejected`](crate::client::SendOutcome) is one of these.

use std::time::Duration;

use faultline_core::domain::RecordId;
use thiserror::Error;

/// Errors surfaced by the report client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The local rate limit is exhausted; nothing was sent or queued
    #[error("Report rate limit reached, retry after {retry_after:?}")]
    RateLimited {
        /// Time until the current window ends
        retry_after: Duration,
    },

    /// The endpoint could not be reached; the report was queued
    #[error("Transient network failure: {0}")]
    TransientNetworkFailure(String),

    /// The endpoint refused the report permanently
    #[error("Report rejected by server: {0}")]
    ServerRejected(String),

    /// An offline record could not be read and was discarded
    #[error("Corrupt offline record {record_id} (seq {seq}): {reason}")]
    StorageCorruption {
        seq: i64,
        record_id: String,
        reason: String,
    },

    /// The offline store failed
    #[error("Offline storage error: {0}")]
    Storage(String),

    /// The report could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A queued record failed too many times and was dropped
    #[error("Record {record_id} dropped after {attempts} failed attempts")]
    RetryLimitExceeded { record_id: RecordId, attempts: u32 },

    /// The client was shut down before the report could be handled
    #[error("Report client is shut down")]
    ClientShutdown,

    /// The client could not be constructed
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether the same report may succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::RateLimited { .. } | ClientError::TransientNetworkFailure(_)
        )
    }

    /// Wraps a storage port error, keeping its context chain.
    pub(crate) fn storage(error: anyhow::Error) -> Self {
        ClientError::Storage(format!("{error:#}"))
    }
}
