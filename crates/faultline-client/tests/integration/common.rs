//! Shared test helpers for client integration tests
//!
//! Provides scripted delivery adapters, a hook recorder and constructors for
//! clients and coordinators backed by an in-memory offline store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use faultline_client::{
    ClientError, EventHooks, ReportClient, ReportClientBuilder, RetryConfig, RetryCoordinator,
};
use faultline_core::domain::{
    Attributes, MiniDumpType, Report, ReportPayload, SubmissionResult,
};
use faultline_core::ports::{DeliveryOutcome, IOfflineStore, IReportDelivery};
use faultline_store::{DatabasePool, SqliteOfflineStore};
use faultline_transport::RateLimiter;

pub const OBJECT_ID: &str = "aaa";

// ============================================================================
// Delivery doubles
// ============================================================================

/// Delivery adapter answering from a script, then from a fallback
pub struct MockDelivery {
    script: Mutex<VecDeque<DeliveryOutcome>>,
    fallback: DeliveryOutcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
    payloads: Mutex<Vec<ReportPayload>>,
}

impl MockDelivery {
    pub fn new(fallback: DeliveryOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(DeliveryOutcome::Success(SubmissionResult::ok(OBJECT_ID)))
    }

    pub fn unreachable() -> Self {
        Self::new(DeliveryOutcome::TransientFailure("connection refused".into()))
    }

    /// Answers with `outcomes` first, in order.
    pub fn with_script(self, outcomes: Vec<DeliveryOutcome>) -> Self {
        *self.script.lock().unwrap() = outcomes.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<ReportPayload> {
        self.payloads.lock().unwrap().clone()
    }

    /// Messages of every submitted payload, in submission order
    pub fn messages(&self) -> Vec<String> {
        self.payloads()
            .into_iter()
            .map(|p| p.message.unwrap_or_default())
            .collect()
    }
}

#[async_trait::async_trait]
impl IReportDelivery for MockDelivery {
    async fn submit(&self, payload: &[u8]) -> DeliveryOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .lock()
            .unwrap()
            .push(ReportPayload::from_bytes(payload).expect("client sent an invalid payload"));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Delivery adapter that behaves like an endpoint configured with a token:
/// the right token is accepted, anything else never gets an answer.
pub struct TokenDelivery {
    expected: String,
    token: String,
}

impl TokenDelivery {
    pub fn new(expected: &str, token: &str) -> Self {
        Self {
            expected: expected.to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl IReportDelivery for TokenDelivery {
    async fn submit(&self, _payload: &[u8]) -> DeliveryOutcome {
        if self.token == self.expected {
            DeliveryOutcome::Success(SubmissionResult::ok(OBJECT_ID))
        } else {
            DeliveryOutcome::TransientFailure("endpoint unreachable".into())
        }
    }
}

// ============================================================================
// Hook recorder
// ============================================================================

/// Captures every hook invocation of one client
#[derive(Clone, Default)]
pub struct Recorder {
    responses: Arc<Mutex<Vec<SubmissionResult>>>,
    errors: Arc<Mutex<Vec<ClientError>>>,
    limit_hits: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn attach(hooks: &EventHooks) -> Self {
        let recorder = Self::default();

        let responses = Arc::clone(&recorder.responses);
        hooks.set_on_server_response(move |result| responses.lock().unwrap().push(result.clone()));

        let errors = Arc::clone(&recorder.errors);
        hooks.set_on_server_error(move |error| errors.lock().unwrap().push(error.clone()));

        let limit_hits = Arc::clone(&recorder.limit_hits);
        hooks.set_on_report_limit_reached(move |_| {
            limit_hits.fetch_add(1, Ordering::SeqCst);
        });

        recorder
    }

    pub fn responses(&self) -> Vec<SubmissionResult> {
        self.responses.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ClientError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn limit_hits(&self) -> usize {
        self.limit_hits.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Setup
// ============================================================================

/// A fresh in-memory offline store; keep the pool alive for the whole test
pub async fn in_memory_store() -> (DatabasePool, Arc<SqliteOfflineStore>) {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(SqliteOfflineStore::new(pool.pool().clone()));
    (pool, store)
}

pub fn builder_for(
    delivery: Arc<dyn IReportDelivery>,
    store: Arc<SqliteOfflineStore>,
) -> ReportClientBuilder {
    ReportClient::builder()
        .delivery_arc(delivery)
        .store_arc(store)
        .submit_timeout(Duration::from_secs(5))
}

pub fn client_for(
    delivery: Arc<dyn IReportDelivery>,
    store: Arc<SqliteOfflineStore>,
) -> (ReportClient, Recorder) {
    let client = builder_for(delivery, store).build().expect("build client");
    let recorder = Recorder::attach(client.hooks());
    (client, recorder)
}

pub fn retry_config() -> RetryConfig {
    RetryConfig {
        interval: Duration::from_secs(3600),
        max_interval: Duration::from_secs(3600),
        batch_size: 2,
        submit_timeout: Duration::from_secs(5),
        max_attempts: 0,
    }
}

pub fn coordinator_for(
    delivery: Arc<dyn IReportDelivery>,
    store: Arc<SqliteOfflineStore>,
    limiter: RateLimiter,
    config: RetryConfig,
) -> (RetryCoordinator, Recorder) {
    let hooks = Arc::new(EventHooks::new());
    let recorder = Recorder::attach(&hooks);
    let coordinator = RetryCoordinator::new(delivery, store, Arc::new(limiter), hooks, config);
    (coordinator, recorder)
}

/// Queues a message report directly in `store`
pub async fn queue_message(store: &SqliteOfflineStore, message: &str) {
    let report = Report::from_message(message, Attributes::new());
    store
        .add(&report, None, MiniDumpType::None)
        .await
        .expect("queue report");
}
