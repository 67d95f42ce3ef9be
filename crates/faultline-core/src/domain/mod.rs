//! Domain entities and business logic
//!
//! This module contains the core domain types for Faultline:
//! - Newtypes for report and record identifiers
//! - Attribute values and the attribute merge rule
//! - Reports, captured exceptions and the derived exception stack
//! - The wire payload and the offline record that stores it
//! - Submission results and domain-specific error types

pub mod attributes;
pub mod errors;
pub mod exception;
pub mod newtypes;
pub mod payload;
pub mod record;
pub mod report;
pub mod result;

// Re-export commonly used types
pub use attributes::{merge_attributes, AttributeValue, Attributes};
pub use errors::DomainError;
pub use exception::{CapturedException, ExceptionEntry, ExceptionStack, StackFrame};
pub use newtypes::*;
pub use payload::ReportPayload;
pub use record::{DatabaseRecord, MiniDumpType};
pub use report::{CallingContext, Report};
pub use result::{ResultStatus, SubmissionResult};
