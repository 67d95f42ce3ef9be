//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! identifier parsing, unknown enum tags read back from storage, and
//! payload encoding failures.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// A minidump type tag that does not name a known variant
    #[error("Invalid minidump type: {0}")]
    InvalidMiniDumpType(String),

    /// An attribute key that cannot be sent (empty or whitespace only)
    #[error("Invalid attribute key: {0:?}")]
    InvalidAttributeKey(String),

    /// The report payload could not be encoded or decoded
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}
