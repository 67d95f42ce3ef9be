//! Offline record types
//!
//! A [`DatabaseRecord`] is the durable form of a report that could not be
//! delivered. It is owned by the offline store from creation until it is
//! deleted after a successful resend, a permanent rejection, or eviction.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RecordId;
use super::payload::ReportPayload;

// ============================================================================
// MiniDumpType
// ============================================================================

/// Kind of process snapshot associated with a record
///
/// The core only stores and forwards this tag; it never captures dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiniDumpType {
    /// No dump attached
    #[default]
    None,
    /// Stack and thread information only
    Normal,
    /// Includes data segments of loaded modules
    WithDataSegments,
    /// Includes open handle information
    WithHandleData,
    /// Full process memory
    WithFullMemory,
}

impl MiniDumpType {
    /// Storage tag for this variant
    pub fn as_str(&self) -> &'static str {
        match self {
            MiniDumpType::None => "none",
            MiniDumpType::Normal => "normal",
            MiniDumpType::WithDataSegments => "with_data_segments",
            MiniDumpType::WithHandleData => "with_handle_data",
            MiniDumpType::WithFullMemory => "with_full_memory",
        }
    }
}

impl fmt::Display for MiniDumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MiniDumpType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(MiniDumpType::None),
            "normal" => Ok(MiniDumpType::Normal),
            "with_data_segments" => Ok(MiniDumpType::WithDataSegments),
            "with_handle_data" => Ok(MiniDumpType::WithHandleData),
            "with_full_memory" => Ok(MiniDumpType::WithFullMemory),
            other => Err(DomainError::InvalidMiniDumpType(other.to_string())),
        }
    }
}

// ============================================================================
// DatabaseRecord
// ============================================================================

/// A report persisted for later delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRecord {
    record_id: RecordId,
    /// Creation order assigned by the store; strictly increasing
    seq: i64,
    payload: Vec<u8>,
    minidump_type: MiniDumpType,
    created_at: DateTime<Utc>,
    attachments: Vec<PathBuf>,
    /// Failed delivery attempts so far
    attempts: u32,
}

impl DatabaseRecord {
    /// Reconstructs a record from stored fields.
    pub fn from_parts(
        record_id: RecordId,
        seq: i64,
        payload: Vec<u8>,
        minidump_type: MiniDumpType,
        created_at: DateTime<Utc>,
        attachments: Vec<PathBuf>,
        attempts: u32,
    ) -> Self {
        Self {
            record_id,
            seq,
            payload,
            minidump_type,
            created_at,
            attachments,
            attempts,
        }
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn seq(&self) -> i64 {
        self.seq
    }

    /// Serialized report bytes, exactly as they are submitted
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn minidump_type(&self) -> MiniDumpType {
        self.minidump_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Decodes the stored payload.
    pub fn decode_payload(&self) -> Result<ReportPayload, DomainError> {
        ReportPayload::from_bytes(&self.payload)
    }
}
