//! SQLite implementation of IOfflineStore
//!
//! ## Type Mapping
//!
//! | Domain Type        | SQL Type | Strategy                                   |
//! |--------------------|----------|--------------------------------------------|
//! | RecordId           | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | payload bytes      | BLOB     | stored verbatim                            |
//! | MiniDumpType       | TEXT     | `.as_str()` / `FromStr`                    |
//! | Vec<PathBuf>       | TEXT     | serde_json array                           |
//! | DateTime<Utc>      | TEXT     | RFC 3339                                   |
//!
//! Every mutation takes the store's write lock, so an insert and the
//! eviction it triggers are never interleaved with another writer.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use faultline_core::domain::{DatabaseRecord, MiniDumpType, RecordId, ReportPayload};
use faultline_core::ports::{CorruptRecord, IOfflineStore, PageRequest, StoredRecord};

use crate::StoreError;

/// SQLite-backed offline report queue
pub struct SqliteOfflineStore {
    pool: SqlitePool,
    /// Maximum number of rows kept; `None` means unbounded
    capacity: Option<u32>,
    write_lock: Mutex<()>,
}

impl SqliteOfflineStore {
    /// Creates an unbounded store over an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            capacity: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Bounds the queue to `capacity` records. `0` removes the bound.
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = (capacity > 0).then_some(capacity);
        self
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }
}

// ============================================================================
// Row decoding
// ============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn decode_row(row: &SqliteRow) -> Result<DatabaseRecord, StoreError> {
    let id_str: String = row.try_get("id")?;
    let seq: i64 = row.try_get("seq")?;
    let payload: Vec<u8> = row.try_get("payload")?;
    let minidump_str: String = row.try_get("minidump_type")?;
    let attachments_str: String = row.try_get("attachments")?;
    let attempts: i64 = row.try_get("attempts")?;
    let created_at_str: String = row.try_get("created_at")?;

    let record_id = RecordId::from_str(&id_str).map_err(|e| {
        StoreError::SerializationError(format!("Invalid RecordId '{}': {}", id_str, e))
    })?;
    let minidump_type = MiniDumpType::from_str(&minidump_str)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let attachments: Vec<PathBuf> = serde_json::from_str(&attachments_str).map_err(|e| {
        StoreError::SerializationError(format!("Invalid attachments '{}': {}", attachments_str, e))
    })?;
    let created_at = parse_datetime(&created_at_str)?;

    // A payload that is not a report can never be delivered.
    ReportPayload::from_bytes(&payload)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;

    Ok(DatabaseRecord::from_parts(
        record_id,
        seq,
        payload,
        minidump_type,
        created_at,
        attachments,
        u32::try_from(attempts).unwrap_or(0),
    ))
}

fn stored_from_row(row: &SqliteRow) -> StoredRecord {
    match decode_row(row) {
        Ok(record) => StoredRecord::Valid(record),
        Err(e) => {
            let seq: i64 = row.try_get("seq").unwrap_or_default();
            let record_id: String = row.try_get("id").unwrap_or_default();
            tracing::error!(seq, record_id = %record_id, error = %e, "Unreadable offline record");
            StoredRecord::Corrupt(CorruptRecord {
                seq,
                record_id,
                reason: e.to_string(),
            })
        }
    }
}

// ============================================================================
// IOfflineStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IOfflineStore for SqliteOfflineStore {
    async fn add_serialized(
        &self,
        payload: Vec<u8>,
        minidump_type: MiniDumpType,
        attachments: Vec<PathBuf>,
    ) -> anyhow::Result<DatabaseRecord> {
        let record_id = RecordId::new();
        let created_at = Utc::now();
        let attachments_json = serde_json::to_string(&attachments)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO offline_records (id, payload, minidump_type, attachments, attempts, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(record_id.to_string())
        .bind(payload.as_slice())
        .bind(minidump_type.as_str())
        .bind(&attachments_json)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        let seq = result.last_insert_rowid();

        if let Some(capacity) = self.capacity {
            // Everything older than the newest `capacity` rows goes, oldest first.
            let evicted: Vec<(i64, String)> = sqlx::query_as(
                "SELECT seq, id FROM offline_records ORDER BY seq DESC LIMIT -1 OFFSET ?",
            )
            .bind(i64::from(capacity))
            .fetch_all(&mut *tx)
            .await?;

            if let Some(newest_evicted) = evicted.iter().map(|(s, _)| *s).max() {
                sqlx::query("DELETE FROM offline_records WHERE seq <= ?")
                    .bind(newest_evicted)
                    .execute(&mut *tx)
                    .await?;
                for (evicted_seq, evicted_id) in evicted.iter().rev() {
                    tracing::warn!(
                        seq = evicted_seq,
                        record_id = %evicted_id,
                        capacity,
                        "Offline queue full, evicted oldest record"
                    );
                }
            }
        }

        tx.commit().await?;

        tracing::debug!(record_id = %record_id, seq, %minidump_type, "Queued report");

        Ok(DatabaseRecord::from_parts(
            record_id,
            seq,
            payload,
            minidump_type,
            created_at,
            attachments,
            0,
        ))
    }

    async fn delete(&self, id: &RecordId) -> anyhow::Result<bool> {
        let id_str = id.to_string();

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM offline_records WHERE id = ?")
            .bind(&id_str)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        tracing::trace!(record_id = %id_str, removed, "Deleted offline record");
        Ok(removed)
    }

    async fn delete_seq(&self, seq: i64) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM offline_records WHERE seq = ?")
            .bind(seq)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> anyhow::Result<u64> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM offline_records")
            .execute(&self.pool)
            .await?;

        tracing::info!(removed = result.rows_affected(), "Cleared offline queue");
        Ok(result.rows_affected())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn latest_seq(&self) -> anyhow::Result<Option<i64>> {
        let seq: Option<i64> = sqlx::query_scalar("SELECT MAX(seq) FROM offline_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(seq)
    }

    async fn enumerate(&self, page: PageRequest) -> anyhow::Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            "SELECT seq, id, payload, minidump_type, attachments, attempts, created_at
             FROM offline_records
             WHERE seq > ? AND seq <= ?
             ORDER BY seq ASC
             LIMIT ?",
        )
        .bind(page.after_seq)
        .bind(page.through_seq.unwrap_or(i64::MAX))
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(stored_from_row).collect())
    }

    async fn record_attempt(&self, id: &RecordId) -> anyhow::Result<Option<u32>> {
        let id_str = id.to_string();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE offline_records SET attempts = attempts + 1 WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let attempts: i64 = sqlx::query_scalar("SELECT attempts FROM offline_records WHERE id = ?")
            .bind(&id_str)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(u32::try_from(attempts).unwrap_or(u32::MAX)))
    }
}
