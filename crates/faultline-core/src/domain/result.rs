//! Submission results

use serde::{Deserialize, Serialize};

/// Outcome status reported with a [`SubmissionResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    ServerError,
}

/// Server answer to a submission
///
/// On success `object` carries the identifier the server assigned to the
/// report; `message` holds any diagnostic text the server returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmissionResult {
    /// Successful submission acknowledged with `object`
    pub fn ok(object: impl Into<String>) -> Self {
        Self {
            object: Some(object.into()),
            status: ResultStatus::Ok,
            message: None,
        }
    }

    /// Failed submission with a diagnostic message
    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            object: None,
            status: ResultStatus::ServerError,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }
}
