//! Faultline Store - Durable offline report queue
//!
//! SQLite-based storage for reports that could not be delivered:
//! - Serialized payloads in creation order
//! - FIFO eviction once a capacity bound is reached
//! - Per-record failed-attempt counters
//!
//! ## Architecture
//!
//! This crate implements the `IOfflineStore` port from `faultline-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteOfflineStore`] - Full `IOfflineStore` implementation
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use faultline_store::{DatabasePool, SqliteOfflineStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/faultline/offline.db")).await?;
//! let store = SqliteOfflineStore::new(pool.pool().clone()).with_capacity(1000);
//! // Use store as IOfflineStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteOfflineStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of a stored row failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
