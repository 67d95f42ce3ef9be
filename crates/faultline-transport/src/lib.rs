//! Faultline Transport - Report delivery over HTTP
//!
//! Provides:
//! - An `IReportDelivery` adapter that POSTs serialized reports to the
//!   collection endpoint and classifies every answer into a typed outcome
//! - A fixed-window client-side rate limiter
//!
//! ## Modules
//!
//! - [`client`] - HTTP submission client with mandatory timeouts
//! - [`rate_limit`] - Per-window submission limiter

pub mod client;
pub mod rate_limit;

pub use client::SubmissionClient;
pub use rate_limit::{RateLimitDecision, RateLimiter};

use thiserror::Error;

/// Errors raised while constructing a transport
///
/// Submissions themselves never fail with an error; see
/// [`faultline_core::ports::DeliveryOutcome`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint host is not a usable URL
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The endpoint host uses a scheme other than http or https
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
