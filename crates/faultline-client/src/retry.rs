//! Offline retry coordinator
//!
//! Drains the offline store by resubmitting queued records, oldest first.
//!
//! ## Cycle
//!
//! ```text
//! latest_seq snapshot ──→ enumerate page ──→ rate limit ──→ submit ──→ settle
//!                              ▲                                         │
//!                              └──────────── next page ◀─────────────────┘
//! ```
//!
//! A cycle only sees records that existed when it started. It stops at the
//! first transient failure or rate limit rejection, leaving that record and
//! everything after it for the next cycle, so delivery order is preserved.
//! Only one cycle runs at a time per coordinator.
//!
//! ## Scheduling
//!
//! [`RetryCoordinator::run`] repeats cycles until cancelled. The delay
//! between cycles starts at the configured interval, doubles after every
//! interrupted or failed cycle up to the configured maximum, and resets
//! after a clean one. [`RetryCoordinator::trigger`] starts a cycle without
//! waiting for the delay.

use std::sync::Arc;
use std::time::Duration;

use faultline_core::config::OfflineConfig;
use faultline_core::domain::DatabaseRecord;
use faultline_core::ports::{
    CorruptRecord, DeliveryOutcome, IOfflineStore, IReportDelivery, PageRequest, StoredRecord,
};
use faultline_transport::{RateLimitDecision, RateLimiter};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::EventHooks;
use crate::ClientError;

/// Retry scheduling and bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay between cycles while everything is healthy
    pub interval: Duration,
    /// Upper bound for the backed-off delay
    pub max_interval: Duration,
    /// Records fetched per page
    pub batch_size: u32,
    /// Upper bound for one resubmission
    pub submit_timeout: Duration,
    /// Failed attempts before a record is dropped; `0` retries forever
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_interval: Duration::from_secs(900),
            batch_size: 25,
            submit_timeout: Duration::from_secs(15),
            max_attempts: 0,
        }
    }
}

impl RetryConfig {
    pub fn from_config(offline: &OfflineConfig, submit_timeout: Duration) -> Self {
        Self {
            interval: Duration::from_secs(offline.retry_interval_secs),
            max_interval: Duration::from_secs(offline.max_retry_interval_secs),
            batch_size: offline.batch_size.max(1),
            submit_timeout,
            max_attempts: offline.max_attempts,
        }
    }

    /// Delay before the next cycle; `clean` is whether the last one finished
    /// without interruption.
    pub fn next_delay(&self, current: Duration, clean: bool) -> Duration {
        if clean {
            self.interval
        } else {
            current.saturating_mul(2).clamp(self.interval, self.max_interval.max(self.interval))
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Records accepted by the endpoint and removed
    pub delivered: u32,
    /// Records refused by the endpoint and removed
    pub rejected: u32,
    /// Unreadable records removed
    pub corrupt: u32,
    /// Records removed after exceeding the attempt limit
    pub expired: u32,
    /// Records that failed transiently and stay queued
    pub deferred: u32,
    /// Whether the cycle ended before its snapshot was exhausted
    pub stopped_early: bool,
    /// Records left in the store afterwards
    pub remaining: u64,
}

impl CycleSummary {
    /// Records removed from the store by this cycle
    pub fn removed(&self) -> u32 {
        self.delivered + self.rejected + self.corrupt + self.expired
    }
}

/// Per-record result inside a cycle
enum RecordOutcome {
    Delivered,
    Rejected,
    Expired,
    Deferred,
    /// Failed transiently but was removed from the store meanwhile
    Vanished,
    RateLimited,
}

struct CoordinatorInner {
    delivery: Arc<dyn IReportDelivery>,
    store: Arc<dyn IOfflineStore>,
    rate_limiter: Arc<RateLimiter>,
    hooks: Arc<EventHooks>,
    config: RetryConfig,
    cycle_lock: Mutex<()>,
    trigger: Notify,
}

/// Resubmits offline records
///
/// Cheap to clone; clones share the cycle lock and trigger.
#[derive(Clone)]
pub struct RetryCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RetryCoordinator {
    pub fn new(
        delivery: Arc<dyn IReportDelivery>,
        store: Arc<dyn IOfflineStore>,
        rate_limiter: Arc<RateLimiter>,
        hooks: Arc<EventHooks>,
        config: RetryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                delivery,
                store,
                rate_limiter,
                hooks,
                config,
                cycle_lock: Mutex::new(()),
                trigger: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }

    /// Wakes [`run`](Self::run) for an immediate cycle. A trigger sent while
    /// no loop is waiting is kept for the next wait.
    pub fn trigger(&self) {
        debug!("Retry cycle requested");
        self.inner.trigger.notify_one();
    }

    // ========================================================================
    // Cycle
    // ========================================================================

    /// Runs one retry cycle over the records queued right now.
    ///
    /// Waits for any cycle already in progress to finish first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] when the store fails. Records handled
    /// before the failure stay handled.
    pub async fn run_cycle(&self) -> Result<CycleSummary, ClientError> {
        let _cycle = self.inner.cycle_lock.lock().await;
        let store = &self.inner.store;
        let mut summary = CycleSummary::default();

        let Some(bound) = store.latest_seq().await.map_err(ClientError::storage)? else {
            debug!("Offline queue empty, nothing to retry");
            return Ok(summary);
        };

        let mut after = 0;
        'pages: loop {
            let page = store
                .enumerate(
                    PageRequest::first(self.inner.config.batch_size)
                        .after(after)
                        .through(bound),
                )
                .await
                .map_err(ClientError::storage)?;
            if page.is_empty() {
                break;
            }

            for stored in page {
                after = stored.seq();
                match stored {
                    StoredRecord::Corrupt(corrupt) => {
                        self.discard_corrupt(corrupt).await;
                        summary.corrupt += 1;
                    }
                    StoredRecord::Valid(record) => match self.retry_record(&record).await? {
                        RecordOutcome::Delivered => summary.delivered += 1,
                        RecordOutcome::Rejected => summary.rejected += 1,
                        RecordOutcome::Expired => summary.expired += 1,
                        RecordOutcome::Deferred => {
                            summary.deferred += 1;
                            summary.stopped_early = true;
                            break 'pages;
                        }
                        RecordOutcome::Vanished | RecordOutcome::RateLimited => {
                            summary.stopped_early = true;
                            break 'pages;
                        }
                    },
                }
            }
        }

        summary.remaining = store.count().await.map_err(ClientError::storage)?;

        if summary.removed() > 0 || summary.stopped_early {
            info!(
                delivered = summary.delivered,
                rejected = summary.rejected,
                corrupt = summary.corrupt,
                expired = summary.expired,
                stopped_early = summary.stopped_early,
                remaining = summary.remaining,
                "Retry cycle finished"
            );
        }
        Ok(summary)
    }

    /// Reports an unreadable record and removes it. A failed removal is
    /// logged and paging continues past the record.
    async fn discard_corrupt(&self, corrupt: CorruptRecord) {
        warn!(
            seq = corrupt.seq,
            record_id = %corrupt.record_id,
            "Discarding unreadable offline record"
        );
        if let Err(e) = self.inner.store.delete_seq(corrupt.seq).await {
            error!(
                seq = corrupt.seq,
                record_id = %corrupt.record_id,
                error = %format!("{e:#}"),
                "Failed to remove unreadable offline record"
            );
        }
        self.inner.hooks.server_error(&ClientError::StorageCorruption {
            seq: corrupt.seq,
            record_id: corrupt.record_id,
            reason: corrupt.reason,
        });
    }

    async fn retry_record(&self, record: &DatabaseRecord) -> Result<RecordOutcome, ClientError> {
        let inner = &self.inner;
        let record_id = record.record_id();

        if let RateLimitDecision::Rejected { retry_after } = inner.rate_limiter.try_acquire() {
            debug!(
                %record_id,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit reached, pausing retries"
            );
            return Ok(RecordOutcome::RateLimited);
        }

        let outcome =
            match tokio::time::timeout(inner.config.submit_timeout, inner.delivery.submit(record.payload()))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => DeliveryOutcome::TransientFailure(format!(
                    "submission timed out after {:?}",
                    inner.config.submit_timeout
                )),
            };

        match outcome {
            DeliveryOutcome::Success(result) => {
                let deleted = inner.store.delete(&record_id).await;
                debug!(%record_id, seq = record.seq(), "Queued report delivered");
                inner.hooks.server_response(&result);
                deleted.map_err(ClientError::storage)?;
                Ok(RecordOutcome::Delivered)
            }
            DeliveryOutcome::ServerRejected(message) => {
                inner
                    .store
                    .delete(&record_id)
                    .await
                    .map_err(ClientError::storage)?;
                warn!(%record_id, %message, "Queued report rejected, dropping it");
                inner.hooks.server_error(&ClientError::ServerRejected(message));
                Ok(RecordOutcome::Rejected)
            }
            DeliveryOutcome::TransientFailure(message) => {
                let Some(attempts) = inner
                    .store
                    .record_attempt(&record_id)
                    .await
                    .map_err(ClientError::storage)?
                else {
                    debug!(%record_id, %message, "Queued report removed while being retried");
                    return Ok(RecordOutcome::Vanished);
                };

                let max = inner.config.max_attempts;
                if max > 0 && attempts >= max {
                    inner
                        .store
                        .delete(&record_id)
                        .await
                        .map_err(ClientError::storage)?;
                    warn!(%record_id, attempts, %message, "Queued report exceeded retry limit");
                    inner
                        .hooks
                        .server_error(&ClientError::RetryLimitExceeded { record_id, attempts });
                    return Ok(RecordOutcome::Expired);
                }

                debug!(%record_id, attempts, %message, "Queued report still undeliverable");
                Ok(RecordOutcome::Deferred)
            }
        }
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// Runs cycles until `shutdown` is cancelled.
    ///
    /// Cancellation interrupts a cycle in progress; a record whose delivery
    /// was cut short stays queued.
    pub async fn run(&self, shutdown: CancellationToken) {
        let config = &self.inner.config;
        info!(
            interval_ms = config.interval.as_millis() as u64,
            max_interval_ms = config.max_interval.as_millis() as u64,
            "Retry coordinator starting"
        );

        let mut delay = config.interval;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.inner.trigger.notified() => {}
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.run_cycle() => result,
            };

            let clean = match result {
                Ok(summary) => !summary.stopped_early,
                Err(e) => {
                    error!(error = %e, "Retry cycle failed");
                    false
                }
            };
            delay = config.next_delay(delay, clean);
            if !clean {
                debug!(delay_ms = delay.as_millis() as u64, "Backing off retries");
            }
        }

        info!("Retry coordinator stopped");
    }
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
