//! Queue command - Inspect and manage the offline queue
//!
//! Provides the `faultline queue` CLI command which:
//! 1. Lists queued records oldest first, flagging unreadable ones
//! 2. Runs one retry cycle against the configured endpoint
//! 3. Deletes a single record or clears the whole queue

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Subcommand;
use faultline_client::ReportClient;
use faultline_core::config::Config;
use faultline_core::domain::RecordId;
use faultline_core::ports::{IOfflineStore, PageRequest, StoredRecord};
use faultline_store::{DatabasePool, SqliteOfflineStore};
use tracing::info;

use crate::output::OutputFormat;

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List queued records
    List {
        /// Maximum number of records to show
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Retry delivery of queued records now
    Flush,
    /// Delete one queued record
    Delete {
        /// Record id
        id: String,
    },
    /// Delete every queued record
    Clear,
}

/// Opens the configured queue, or `None` when no queue exists yet.
async fn open_store(config: &Config) -> Result<Option<SqliteOfflineStore>> {
    let db_path = &config.offline.database_path;
    if !db_path.exists() {
        return Ok(None);
    }
    let pool = DatabasePool::new(db_path)
        .await
        .with_context(|| format!("Failed to open offline queue at {}", db_path.display()))?;
    Ok(Some(
        SqliteOfflineStore::new(pool.pool().clone()).with_capacity(config.offline.capacity),
    ))
}

/// One-line JSON view of a stored record
fn record_json(stored: &StoredRecord) -> serde_json::Value {
    match stored {
        StoredRecord::Valid(record) => {
            let payload = record.decode_payload().ok();
            serde_json::json!({
                "seq": record.seq(),
                "id": record.record_id().to_string(),
                "created_at": record.created_at().to_rfc3339(),
                "attempts": record.attempts(),
                "minidump_type": record.minidump_type().as_str(),
                "message": payload.as_ref().and_then(|p| p.message.clone()),
                "classifiers": payload.map(|p| p.classifiers).unwrap_or_default(),
            })
        }
        StoredRecord::Corrupt(corrupt) => serde_json::json!({
            "seq": corrupt.seq,
            "id": corrupt.record_id,
            "corrupt": true,
            "reason": corrupt.reason,
        }),
    }
}

impl QueueCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let config = Config::load_or_default(config_path);
        match self {
            QueueCommand::List { limit } => list(&config, *limit, format).await,
            QueueCommand::Flush => flush(&config, format).await,
            QueueCommand::Delete { id } => delete(&config, id, format).await,
            QueueCommand::Clear => clear(&config, format).await,
        }
    }
}

async fn list(config: &Config, limit: u32, format: OutputFormat) -> Result<()> {
    let formatter = format.formatter();

    let Some(store) = open_store(config).await? else {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "count": 0, "records": [] }));
        } else {
            formatter.success("Offline queue is empty");
        }
        return Ok(());
    };

    let count = store.count().await.context("Failed to count queued records")?;
    let records = store
        .enumerate(PageRequest::first(limit.max(1)))
        .await
        .context("Failed to read queued records")?;

    if format.is_json() {
        let records: Vec<_> = records.iter().map(record_json).collect();
        formatter.print_json(&serde_json::json!({ "count": count, "records": records }));
        return Ok(());
    }

    if count == 0 {
        formatter.success("Offline queue is empty");
        return Ok(());
    }

    formatter.success(&format!("{count} queued record(s)"));
    for stored in &records {
        match stored {
            StoredRecord::Valid(record) => {
                let summary = record
                    .decode_payload()
                    .ok()
                    .and_then(|p| p.message)
                    .unwrap_or_default();
                formatter.info(&format!(
                    "#{:<5} {}  {}  attempts={}  {}",
                    record.seq(),
                    record.record_id(),
                    record.created_at().format("%Y-%m-%d %H:%M:%S"),
                    record.attempts(),
                    summary
                ));
            }
            StoredRecord::Corrupt(corrupt) => {
                formatter.warn(&format!(
                    "#{} {} is unreadable: {}",
                    corrupt.seq, corrupt.record_id, corrupt.reason
                ));
            }
        }
    }
    if count > records.len() as u64 {
        formatter.info(&format!("... {} more", count - records.len() as u64));
    }
    Ok(())
}

async fn flush(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = format.formatter();

    let client = ReportClient::from_config(config)
        .await
        .context("Failed to create client")?;
    client.hooks().set_on_server_error(|error| {
        tracing::warn!(error = %error, "Queued report not delivered");
    });

    info!("Flushing offline queue");
    let result = client.flush().await;
    client.shutdown().await;
    let summary = result.context("Retry cycle failed")?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "delivered": summary.delivered,
            "rejected": summary.rejected,
            "corrupt": summary.corrupt,
            "expired": summary.expired,
            "deferred": summary.deferred,
            "stopped_early": summary.stopped_early,
            "remaining": summary.remaining,
        }));
    } else {
        formatter.success(&format!("Delivered {} queued report(s)", summary.delivered));
        formatter.field("Rejected", &summary.rejected.to_string());
        formatter.field("Corrupt", &summary.corrupt.to_string());
        formatter.field("Expired", &summary.expired.to_string());
        formatter.field("Remaining", &summary.remaining.to_string());
        if summary.stopped_early {
            formatter.warn("Endpoint still unavailable or rate limited; remaining reports stay queued");
        }
    }
    Ok(())
}

async fn delete(config: &Config, id: &str, format: OutputFormat) -> Result<()> {
    let formatter = format.formatter();
    let record_id =
        RecordId::from_str(id).with_context(|| format!("'{id}' is not a record id"))?;

    let removed = match open_store(config).await? {
        Some(store) => store
            .delete(&record_id)
            .await
            .context("Failed to delete record")?,
        None => false,
    };

    if format.is_json() {
        formatter.print_json(&serde_json::json!({ "id": id, "removed": removed }));
    } else if removed {
        formatter.success(&format!("Deleted record {record_id}"));
    } else {
        formatter.warn(&format!("No queued record {record_id}"));
    }
    Ok(())
}

async fn clear(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = format.formatter();

    let removed = match open_store(config).await? {
        Some(store) => store.delete_all().await.context("Failed to clear queue")?,
        None => 0,
    };

    if format.is_json() {
        formatter.print_json(&serde_json::json!({ "removed": removed }));
    } else {
        formatter.success(&format!("Removed {removed} queued record(s)"));
    }
    Ok(())
}
