//! Report client facade
//!
//! [`ReportClient`] is the single entry point applications use. It owns one
//! rate limiter, one offline store handle, the event hooks and the retry
//! coordinator, and routes every report through:
//!
//! ```text
//! send ──→ rate limit ──→ payload + before_send ──→ submit ──┬─→ Delivered
//!              │                                              ├─→ Rejected (server)
//!              └─→ Rejected (rate limited)                    └─→ Queued (offline store)
//! ```
//!
//! Every `send` settles with exactly one outcome and exactly one hook call:
//! `on_server_response` for a delivered report, `on_server_error` otherwise.
//! Submission runs in its own task, so dropping the future returned by
//! `send` never loses a report that was already handed over.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use faultline_client::{ReportClient, SendOutcome};
//! use faultline_core::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(&Config::default_path())?;
//! let client = ReportClient::from_config(&config).await?;
//! client.hooks().set_on_server_error(|e| eprintln!("report not delivered: {e}"));
//!
//! let retry_loop = client.start_retry_loop();
//! if let SendOutcome::Delivered(result) = client.send_message("cache warmup failed").await {
//!     println!("stored as {:?}", result.object);
//! }
//! client.shutdown().await;
//! retry_loop.await?;
//! # Ok(())
//! # }
//! ```

use std::error::Error;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use faultline_core::config::Config;
use faultline_core::domain::{
    AttributeValue, Attributes, DatabaseRecord, MiniDumpType, Report, ReportPayload,
    SubmissionResult,
};
use faultline_core::ports::{DeliveryOutcome, IOfflineStore, IReportDelivery};
use faultline_store::{DatabasePool, SqliteOfflineStore};
use faultline_transport::{RateLimitDecision, RateLimiter, SubmissionClient};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::events::EventHooks;
use crate::os_info::OsInfo;
use crate::retry::{CycleSummary, RetryConfig, RetryCoordinator};
use crate::ClientError;

/// Default upper bound for one submission
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// How a single `send` settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The endpoint accepted the report
    Delivered(SubmissionResult),
    /// Delivery failed transiently; the report is in the offline store
    Queued(DatabaseRecord),
    /// The report was dropped
    Rejected(ClientError),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered(_))
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, SendOutcome::Queued(_))
    }

    /// The error reported to `on_server_error`, if any
    pub fn error(&self) -> Option<&ClientError> {
        match self {
            SendOutcome::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// ReportClient
// ============================================================================

struct ClientInner {
    delivery: Arc<dyn IReportDelivery>,
    store: Arc<dyn IOfflineStore>,
    rate_limiter: Arc<RateLimiter>,
    hooks: Arc<EventHooks>,
    coordinator: RetryCoordinator,
    attributes: Attributes,
    minidump_type: MiniDumpType,
    submit_timeout: Duration,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    closed: AtomicBool,
}

/// Sends reports, queues what cannot be delivered and retries it later
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ReportClient {
    inner: Arc<ClientInner>,
}

impl ReportClient {
    pub fn builder() -> ReportClientBuilder {
        ReportClientBuilder::default()
    }

    /// Builds a client from the loaded configuration: HTTP delivery to the
    /// configured endpoint and a SQLite offline store at the configured path.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::Configuration`] when the endpoint is not
    /// configured or invalid, and with [`ClientError::Storage`] when the
    /// database cannot be opened.
    pub async fn from_config(config: &Config) -> Result<Self, ClientError> {
        let errors = config.validate();
        if let Some(first) = errors.first() {
            return Err(ClientError::Configuration(first.to_string()));
        }
        let (Some(host), Some(token)) = (&config.endpoint.host, &config.endpoint.token) else {
            return Err(ClientError::Configuration(
                "endpoint.host and endpoint.token are required to send reports".into(),
            ));
        };

        let delivery = SubmissionClient::new(host, token, config.endpoint.request_timeout())
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        let pool = DatabasePool::new(&config.offline.database_path)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        let store =
            SqliteOfflineStore::new(pool.pool().clone()).with_capacity(config.offline.capacity);

        let minidump_type = if config.offline.include_minidump {
            MiniDumpType::Normal
        } else {
            MiniDumpType::None
        };

        Self::builder()
            .delivery(delivery)
            .store(store)
            .rate_limiter(Arc::new(RateLimiter::new(
                config.rate_limiting.reports_per_minute,
                config.rate_limiting.window(),
            )))
            .submit_timeout(config.endpoint.request_timeout())
            .retry_config(RetryConfig::from_config(
                &config.offline,
                config.endpoint.request_timeout(),
            ))
            .minidump_type(minidump_type)
            .build()
    }

    pub fn hooks(&self) -> &EventHooks {
        &self.inner.hooks
    }

    /// Attributes attached to every report sent by this client
    pub fn attributes(&self) -> &Attributes {
        &self.inner.attributes
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    pub fn store(&self) -> &Arc<dyn IOfflineStore> {
        &self.inner.store
    }

    pub fn retry_coordinator(&self) -> &RetryCoordinator {
        &self.inner.coordinator
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Sends `report`, merging `attributes` over the report's own.
    pub async fn send(&self, report: Report, attributes: Option<&Attributes>) -> SendOutcome {
        let inner = &self.inner;

        if self.is_shut_down() {
            return inner.reject(ClientError::ClientShutdown);
        }

        if let RateLimitDecision::Rejected { retry_after } = inner.rate_limiter.try_acquire() {
            inner.hooks.report_limit_reached(&report);
            return inner.reject(ClientError::RateLimited { retry_after });
        }

        let mut payload = ReportPayload::from_report(&report, &inner.attributes, attributes);
        inner.hooks.before_send(&mut payload);
        let bytes = match payload.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return inner.reject(ClientError::Serialization(e.to_string())),
        };

        debug!(
            report_id = %report.id(),
            classifier = report.classifier(),
            bytes = bytes.len(),
            "Submitting report"
        );

        let task_inner = Arc::clone(inner);
        let handle = inner
            .tasks
            .spawn(async move { task_inner.submit_and_settle(bytes).await });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(report_id = %report.id(), error = %e, "Submission task did not complete");
                inner.reject(ClientError::TransientNetworkFailure(format!(
                    "submission task failed: {e}"
                )))
            }
        }
    }

    /// Sends a message report.
    #[track_caller]
    pub fn send_message(&self, message: &str) -> impl Future<Output = SendOutcome> + Send + '_ {
        let report = Report::from_message(message, Attributes::new());
        async move { self.send(report, None).await }
    }

    /// Sends an exception report for `error`.
    #[track_caller]
    pub fn send_error<E>(&self, error: &E) -> impl Future<Output = SendOutcome> + Send + '_
    where
        E: Error + 'static,
    {
        let report = Report::from_error(error, Attributes::new());
        async move { self.send(report, None).await }
    }

    /// Runs one retry cycle now, waiting for any cycle in progress.
    pub async fn flush(&self) -> Result<CycleSummary, ClientError> {
        if self.is_shut_down() {
            return Err(ClientError::ClientShutdown);
        }
        self.inner.coordinator.run_cycle().await
    }

    /// Spawns the background retry loop. It stops on [`shutdown`](Self::shutdown).
    pub fn start_retry_loop(&self) -> JoinHandle<()> {
        let coordinator = self.inner.coordinator.clone();
        let token = self.inner.shutdown.child_token();
        self.inner
            .tasks
            .spawn(async move { coordinator.run(token).await })
    }

    /// Stops the client.
    ///
    /// Submissions still in flight are cancelled and their reports queued
    /// offline; the call returns once they are settled and the retry loop
    /// has stopped. Later sends are rejected with
    /// [`ClientError::ClientShutdown`].
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(in_flight = self.inner.tasks.len(), "Shutting down report client");
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        info!("Report client stopped");
    }
}

impl std::fmt::Debug for ReportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportClient")
            .field("attributes", &self.inner.attributes.len())
            .field("minidump_type", &self.inner.minidump_type)
            .field("submit_timeout", &self.inner.submit_timeout)
            .field("closed", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl ClientInner {
    fn reject(&self, error: ClientError) -> SendOutcome {
        debug!(error = %error, "Report not sent");
        self.hooks.server_error(&error);
        SendOutcome::Rejected(error)
    }

    async fn submit_and_settle(&self, bytes: Vec<u8>) -> SendOutcome {
        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                DeliveryOutcome::TransientFailure("client shut down during submission".into())
            }
            result = tokio::time::timeout(self.submit_timeout, self.delivery.submit(&bytes)) => {
                result.unwrap_or_else(|_| {
                    DeliveryOutcome::TransientFailure(format!(
                        "submission timed out after {:?}",
                        self.submit_timeout
                    ))
                })
            }
        };

        match outcome {
            DeliveryOutcome::Success(result) => {
                self.hooks.server_response(&result);
                SendOutcome::Delivered(result)
            }
            DeliveryOutcome::ServerRejected(message) => {
                self.reject(ClientError::ServerRejected(message))
            }
            DeliveryOutcome::TransientFailure(message) => {
                match self
                    .store
                    .add_serialized(bytes, self.minidump_type, Vec::new())
                    .await
                {
                    Ok(record) => {
                        info!(
                            record_id = %record.record_id(),
                            seq = record.seq(),
                            reason = %message,
                            "Report queued for retry"
                        );
                        self.hooks
                            .server_error(&ClientError::TransientNetworkFailure(message));
                        SendOutcome::Queued(record)
                    }
                    Err(e) => {
                        warn!(error = %format!("{e:#}"), "Failed to queue undelivered report");
                        self.reject(ClientError::storage(e))
                    }
                }
            }
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`ReportClient`]
///
/// Delivery and store are required; everything else has a default.
pub struct ReportClientBuilder {
    delivery: Option<Arc<dyn IReportDelivery>>,
    store: Option<Arc<dyn IOfflineStore>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    hooks: Option<Arc<EventHooks>>,
    attributes: Attributes,
    machine_attributes: bool,
    minidump_type: MiniDumpType,
    submit_timeout: Duration,
    retry_config: Option<RetryConfig>,
}

impl Default for ReportClientBuilder {
    fn default() -> Self {
        Self {
            delivery: None,
            store: None,
            rate_limiter: None,
            hooks: None,
            attributes: Attributes::new(),
            machine_attributes: true,
            minidump_type: MiniDumpType::None,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            retry_config: None,
        }
    }
}

impl ReportClientBuilder {
    pub fn delivery(self, delivery: impl IReportDelivery + 'static) -> Self {
        self.delivery_arc(Arc::new(delivery))
    }

    pub fn delivery_arc(mut self, delivery: Arc<dyn IReportDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn store(self, store: impl IOfflineStore + 'static) -> Self {
        self.store_arc(Arc::new(store))
    }

    pub fn store_arc(mut self, store: Arc<dyn IOfflineStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to an unlimited limiter.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Shares an existing hook set instead of creating a new one.
    pub fn hooks(mut self, hooks: Arc<EventHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Client-level attribute; report and call attributes override it.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Whether to attach OS attributes (`system.*`). Enabled by default.
    pub fn machine_attributes(mut self, enabled: bool) -> Self {
        self.machine_attributes = enabled;
        self
    }

    pub fn minidump_type(mut self, minidump_type: MiniDumpType) -> Self {
        self.minidump_type = minidump_type;
        self
    }

    pub fn submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// # Errors
    ///
    /// Fails with [`ClientError::Configuration`] when delivery or store is
    /// missing, or the submit timeout is zero.
    pub fn build(self) -> Result<ReportClient, ClientError> {
        let delivery = self
            .delivery
            .ok_or_else(|| ClientError::Configuration("a delivery adapter is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| ClientError::Configuration("an offline store is required".into()))?;
        if self.submit_timeout.is_zero() {
            return Err(ClientError::Configuration(
                "submit timeout must be greater than zero".into(),
            ));
        }

        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::unlimited()));
        let hooks = self.hooks.unwrap_or_default();

        let mut attributes = if self.machine_attributes {
            OsInfo::collect().to_attributes()
        } else {
            Attributes::new()
        };
        attributes.extend(self.attributes);

        let retry_config = self.retry_config.unwrap_or_else(|| RetryConfig {
            submit_timeout: self.submit_timeout,
            ..RetryConfig::default()
        });
        let coordinator = RetryCoordinator::new(
            Arc::clone(&delivery),
            Arc::clone(&store),
            Arc::clone(&rate_limiter),
            Arc::clone(&hooks),
            retry_config,
        );

        debug!(
            attributes = attributes.len(),
            rate_limit = rate_limiter.max_per_window(),
            "Report client created"
        );

        Ok(ReportClient {
            inner: Arc::new(ClientInner {
                delivery,
                store,
                rate_limiter,
                hooks,
                coordinator,
                attributes,
                minidump_type: self.minidump_type,
                submit_timeout: self.submit_timeout,
                shutdown: CancellationToken::new(),
                tasks: TaskTracker::new(),
                closed: AtomicBool::new(false),
            }),
        })
    }
}
