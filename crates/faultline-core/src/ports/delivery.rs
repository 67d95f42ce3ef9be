//! Report delivery port (driven/secondary port)
//!
//! This module defines the interface for submitting a serialized report to
//! the collection endpoint.
//!
//! ## Design Notes
//!
//! - `submit` does not return `Result`: every failure mode is a typed
//!   [`DeliveryOutcome`] so callers decide retry eligibility without
//!   inspecting error strings.
//! - Implementations must bound each call with a timeout.

use crate::domain::SubmissionResult;

/// Classified result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint accepted the report
    Success(SubmissionResult),
    /// The endpoint refused the report permanently (bad token, malformed
    /// payload). Never retried.
    ServerRejected(String),
    /// Network unreachable, timeout, server overload. Retried later.
    TransientFailure(String),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Success(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryOutcome::TransientFailure(_))
    }
}

/// Submits serialized reports to a collection endpoint
#[async_trait::async_trait]
pub trait IReportDelivery: Send + Sync {
    /// Submits one serialized report.
    async fn submit(&self, payload: &[u8]) -> DeliveryOutcome;
}
