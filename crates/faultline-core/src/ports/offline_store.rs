//! Offline store port (driven/secondary port)
//!
//! This module defines the interface for the durable queue that holds
//! reports which could not be delivered.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - Enumeration is paged by creation sequence so large queues never have
//!   to be loaded at once, and so a caller can bound a pass to the records
//!   that existed when it started.
//! - Rows that cannot be decoded are returned as [`StoredRecord::Corrupt`]
//!   instead of failing the whole page.

use std::path::PathBuf;

use crate::domain::{Attributes, DatabaseRecord, MiniDumpType, RecordId, Report, ReportPayload};

// ============================================================================
// PageRequest
// ============================================================================

/// Window of records to enumerate, ordered by creation sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Only records with `seq` strictly greater than this
    pub after_seq: i64,
    /// Only records with `seq` less than or equal to this, when set
    pub through_seq: Option<i64>,
    /// Maximum number of records returned
    pub limit: u32,
}

impl PageRequest {
    /// First page of up to `limit` records
    pub fn first(limit: u32) -> Self {
        Self {
            after_seq: 0,
            through_seq: None,
            limit,
        }
    }

    /// Bounds the enumeration to records created up to `seq`.
    pub fn through(mut self, seq: i64) -> Self {
        self.through_seq = Some(seq);
        self
    }

    /// Continues after `seq`.
    pub fn after(mut self, seq: i64) -> Self {
        self.after_seq = seq;
        self
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(100)
    }
}

// ============================================================================
// StoredRecord
// ============================================================================

/// A row that exists in the store but cannot be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptRecord {
    pub seq: i64,
    /// Raw identifier as stored; may itself be unparseable
    pub record_id: String,
    pub reason: String,
}

/// One enumerated row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRecord {
    Valid(DatabaseRecord),
    Corrupt(CorruptRecord),
}

impl StoredRecord {
    pub fn seq(&self) -> i64 {
        match self {
            StoredRecord::Valid(record) => record.seq(),
            StoredRecord::Corrupt(corrupt) => corrupt.seq,
        }
    }
}

// ============================================================================
// IOfflineStore
// ============================================================================

/// Durable FIFO queue of undelivered reports
///
/// Implementations must survive process restart and evict the oldest
/// records first when over capacity.
#[async_trait::async_trait]
pub trait IOfflineStore: Send + Sync {
    /// Persists an already serialized report.
    async fn add_serialized(
        &self,
        payload: Vec<u8>,
        minidump_type: MiniDumpType,
        attachments: Vec<PathBuf>,
    ) -> anyhow::Result<DatabaseRecord>;

    /// Serializes `report` with `attributes` merged in and persists it.
    async fn add(
        &self,
        report: &Report,
        attributes: Option<&Attributes>,
        minidump_type: MiniDumpType,
    ) -> anyhow::Result<DatabaseRecord> {
        let payload = ReportPayload::from_report(report, &Attributes::new(), attributes);
        self.add_serialized(payload.to_bytes()?, minidump_type, Vec::new())
            .await
    }

    /// Removes a record. Returns `false` when it did not exist.
    async fn delete(&self, id: &RecordId) -> anyhow::Result<bool>;

    /// Removes the row with sequence number `seq`. Used for rows whose
    /// identifier cannot be decoded. Returns `false` when it did not exist.
    async fn delete_seq(&self, seq: i64) -> anyhow::Result<bool>;

    /// Removes every record, returning how many were deleted.
    async fn delete_all(&self) -> anyhow::Result<u64>;

    /// Number of records currently held
    async fn count(&self) -> anyhow::Result<u64>;

    /// Highest sequence number currently held, if any
    async fn latest_seq(&self) -> anyhow::Result<Option<i64>>;

    /// Returns a page of records, oldest first.
    async fn enumerate(&self, page: PageRequest) -> anyhow::Result<Vec<StoredRecord>>;

    /// Increments the failed-attempt counter and returns the new value.
    ///
    /// Returns `None` when the record is no longer stored.
    async fn record_attempt(&self, id: &RecordId) -> anyhow::Result<Option<u32>>;
}
