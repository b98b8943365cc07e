//! Shared test helpers for `shiftsync-core` integration tests.
//!
//! Scripted submitters, a recording fallback and wake trigger, and an engine
//! factory wired to the in-memory store and a mock clock.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use chrono::{DateTime, Utc};
use shiftsync_common::{Clock, MockClock};
use shiftsync_core::sync::ports::{
    FallbackAction, OperationStore, SubmissionReceipt, SubmissionRequest, Submitter,
    WakeTrigger,
};
use shiftsync_core::{
    EngineConfig, EventBus, InMemoryOperationStore, NetworkMonitor, StrategyRegistry,
    SubmissionError, SyncEngine,
};
use shiftsync_domain::{
    Operation, OperationStatus, OperationType, Result as DomainResult, StatusCounts, SyncEvent,
};
use tokio::sync::Notify;

pub type SubmitResult = Result<SubmissionReceipt, SubmissionError>;

/// Submitter that replays queued responses, then a default
pub struct ScriptedSubmitter {
    calls: Mutex<Vec<SubmissionRequest>>,
    script: Mutex<VecDeque<SubmitResult>>,
    default: Mutex<SubmitResult>,
}

impl ScriptedSubmitter {
    /// Accepts everything with confirmation id `conf`
    pub fn accepting() -> Arc<Self> {
        Self::with_default(Ok(SubmissionReceipt::confirmed("conf")))
    }

    pub fn failing(error: SubmissionError) -> Arc<Self> {
        Self::with_default(Err(error))
    }

    pub fn with_default(default: SubmitResult) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
        })
    }

    /// Queue a one-shot response ahead of the default
    pub fn push(&self, response: SubmitResult) {
        self.script.lock().push_back(response);
    }

    pub fn set_default(&self, response: SubmitResult) {
        *self.default.lock() = response;
    }

    pub fn calls(&self) -> Vec<SubmissionRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every operation id submitted so far, in call order
    pub fn submitted_ids(&self) -> Vec<String> {
        self.calls.lock().iter().flat_map(SubmissionRequest::operation_ids).collect()
    }
}

#[async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit(&self, request: SubmissionRequest) -> SubmitResult {
        self.calls.lock().push(request);
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.default.lock().clone())
    }
}

/// Submitter that parks every call until released
pub struct GatedSubmitter {
    pub entered: Notify,
    pub release: Notify,
    calls: AtomicUsize,
}

impl GatedSubmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entered: Notify::new(), release: Notify::new(), calls: AtomicUsize::new(0) })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Submitter for GatedSubmitter {
    async fn submit(&self, _request: SubmissionRequest) -> SubmitResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(SubmissionReceipt::default())
    }
}

/// In-memory store that can hold the next `get` after it has read the row
pub struct PausingStore {
    pub inner: InMemoryOperationStore,
    pub read_done: Notify,
    pub resume: Notify,
    pause_next_get: AtomicBool,
}

impl PausingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryOperationStore::new(),
            read_done: Notify::new(),
            resume: Notify::new(),
            pause_next_get: AtomicBool::new(false),
        })
    }

    pub fn pause_next_get(&self) {
        self.pause_next_get.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OperationStore for PausingStore {
    async fn put(&self, operation: &Operation) -> DomainResult<()> {
        self.inner.put(operation).await
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Operation>> {
        let found = self.inner.get(id).await?;
        if self.pause_next_get.swap(false, Ordering::SeqCst) {
            self.read_done.notify_one();
            self.resume.notified().await;
        }
        Ok(found)
    }

    async fn get_many(&self, ids: &[String]) -> DomainResult<Vec<Operation>> {
        self.inner.get_many(ids).await
    }

    async fn query_by_status(&self, status: OperationStatus) -> DomainResult<Vec<Operation>> {
        self.inner.query_by_status(status).await
    }

    async fn query_by_type(&self, op_type: &OperationType) -> DomainResult<Vec<Operation>> {
        self.inner.query_by_type(op_type).await
    }

    async fn delete(&self, id: &str) -> DomainResult<bool> {
        self.inner.delete(id).await
    }

    async fn claim(&self, ids: &[String], now: DateTime<Utc>) -> DomainResult<Vec<Operation>> {
        self.inner.claim(ids, now).await
    }

    async fn recover_interrupted(&self) -> DomainResult<usize> {
        self.inner.recover_interrupted().await
    }

    async fn status_counts(&self) -> DomainResult<StatusCounts> {
        self.inner.status_counts().await
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        self.inner.purge_terminal_before(cutoff).await
    }

    async fn reset_failed(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        self.inner.reset_failed(now).await
    }

    async fn reset_for_retry(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Operation>> {
        self.inner.reset_for_retry(id, now).await
    }
}

/// Fallback that records the operations it was called for
#[derive(Default)]
pub struct RecordingFallback {
    pub invoked: Mutex<Vec<String>>,
}

impl RecordingFallback {
    pub fn count(&self) -> usize {
        self.invoked.lock().len()
    }
}

#[async_trait]
impl FallbackAction for RecordingFallback {
    async fn on_failed(&self, operation: &Operation, _reason: &str) -> DomainResult<()> {
        self.invoked.lock().push(operation.id.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingWake {
    pub registrations: Mutex<Vec<usize>>,
    pub cancels: AtomicUsize,
}

#[async_trait]
impl WakeTrigger for RecordingWake {
    async fn register(&self, pending: usize) -> DomainResult<()> {
        self.registrations.lock().push(pending);
        Ok(())
    }

    async fn cancel(&self) -> DomainResult<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine under test plus handles to its collaborators
pub struct Harness {
    pub engine: SyncEngine,
    pub store: Arc<InMemoryOperationStore>,
    pub clock: MockClock,
    pub network: Arc<NetworkMonitor>,
    pub events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl Harness {
    pub fn new(submitter: Arc<dyn Submitter>, online: bool) -> Self {
        Self::with_strategies(submitter, online, StrategyRegistry::new())
    }

    pub fn with_strategies(
        submitter: Arc<dyn Submitter>,
        online: bool,
        strategies: StrategyRegistry,
    ) -> Self {
        let config = EngineConfig { retry_timers: false, ..EngineConfig::default() };
        Self::with_config(submitter, online, strategies, config)
    }

    /// Engine with retry timers armed; pair with a paused tokio clock
    pub fn with_timers(submitter: Arc<dyn Submitter>, online: bool) -> Self {
        Self::with_config(submitter, online, StrategyRegistry::new(), EngineConfig::default())
    }

    pub fn with_config(
        submitter: Arc<dyn Submitter>,
        online: bool,
        strategies: StrategyRegistry,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(InMemoryOperationStore::new());
        let clock = MockClock::new();
        let network = Arc::new(NetworkMonitor::new(online));
        let bus = Arc::new(EventBus::default());
        let events = record_events(&bus);

        let engine = SyncEngine::builder(store.clone(), submitter)
            .clock(Arc::new(clock.clone()))
            .network(Arc::clone(&network))
            .events(bus)
            .strategies(strategies)
            .config(config)
            .build();

        Self { engine, store, clock, network, events }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name().to_string()).collect()
    }

    /// Names of events about one operation, in emission order
    pub fn events_for(&self, operation_id: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.operation_id() == Some(operation_id))
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Position of the first matching event
    pub fn position(&self, name: &str, operation_id: &str) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|e| e.name() == name && e.operation_id() == Some(operation_id))
    }
}

pub fn record_events(bus: &EventBus) -> Arc<Mutex<Vec<SyncEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    bus.add_listener(move |event| {
        sink.lock().push(event.clone());
        Ok(())
    });
    events
}

pub fn server_error() -> SubmissionError {
    SubmissionError::Server { status: 503, message: "unavailable".into() }
}
