//! Faultline client
//!
//! Provides:
//! - [`ReportClient`], the facade applications send reports through
//! - Event hooks observing delivery outcomes
//! - Offline retry of reports that could not be delivered
//!
//! ## Modules
//!
//! - [`client`] - Send pipeline, builder and lifecycle
//! - [`events`] - Replaceable callbacks for responses, errors and rate limits
//! - [`retry`] - Retry coordinator draining the offline store
//! - [`os_info`] - Non-identifying machine attributes

pub mod client;
pub mod error;
pub mod events;
pub mod os_info;
pub mod retry;

pub use client::{ReportClient, ReportClientBuilder, SendOutcome};
pub use error::ClientError;
pub use events::EventHooks;
pub use retry::{CycleSummary, RetryConfig, RetryCoordinator};
