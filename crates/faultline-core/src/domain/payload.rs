//! Wire payload
//!
//! [`ReportPayload`] is the JSON document POSTed to the collection endpoint.
//! The same bytes are stored in the offline queue, so a resent report is
//! byte-for-byte what the first attempt would have sent.

use serde::{Deserialize, Serialize};

use super::attributes::Attributes;
use super::errors::DomainError;
use super::exception::{ExceptionEntry, StackFrame};
use super::newtypes::ReportId;
use super::report::{CallingContext, Report};

/// Language identifier sent with every payload
pub const LANG: &str = "rust";
/// Agent name sent with every payload
pub const AGENT: &str = "faultline";
/// Agent version sent with every payload
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn lang_version() -> String {
    option_env!("CARGO_PKG_RUST_VERSION")
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Serialized form of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub uuid: ReportId,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub lang: String,
    pub lang_version: String,
    pub agent: String,
    pub agent_version: String,
    /// `[classifier]` for exception reports, empty otherwise
    #[serde(default)]
    pub classifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error chain, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<ExceptionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<StackFrame>,
    #[serde(default)]
    pub attributes: Attributes,
    pub calling_context: CallingContext,
}

impl ReportPayload {
    /// Builds the payload for `report`.
    ///
    /// Attribute precedence, lowest to highest: `client_attributes`, the
    /// report's own attributes, `call_attributes`.
    pub fn from_report(
        report: &Report,
        client_attributes: &Attributes,
        call_attributes: Option<&Attributes>,
    ) -> Self {
        let mut attributes = client_attributes.clone();
        attributes.extend(
            report
                .concat_attributes(call_attributes)
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let (classifiers, exceptions, stack) = match report.exception_stack() {
            Some(stack) => (
                vec![report.classifier().to_string()],
                stack.exceptions.clone(),
                stack.frames.clone(),
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        Self {
            uuid: report.id(),
            timestamp: report.timestamp().timestamp(),
            lang: LANG.to_string(),
            lang_version: lang_version(),
            agent: AGENT.to_string(),
            agent_version: AGENT_VERSION.to_string(),
            classifiers,
            message: report.message().map(str::to_string),
            exceptions,
            stack,
            attributes,
            calling_context: report.calling_context().clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|e| DomainError::InvalidPayload(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(bytes).map_err(|e| DomainError::InvalidPayload(e.to_string()))
    }
}
