//! Sync engine
//!
//! Owns the queue lifecycle: enqueue, sync cycles, retry timers, status
//! queries. Collaborators come in through ports so the same engine runs over
//! SQLite in production and over the in-memory store in tests.
//!
//! A cycle:
//! 1. single-flight guard (a concurrent request is a coalesced no-op)
//! 2. load pending operations
//! 3. skip not-due, offline and blocked work; cascade-fail operations whose
//!    dependency failed
//! 4. sort by priority then age, group by type, cap each group
//! 5. claim, dispatch, settle each result
//! 6. retention cleanup, wake registration

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use shiftsync_common::{Clock, SystemClock};
use shiftsync_domain::constants::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_RETRY_DELAY_SECS, DEFAULT_RETENTION_DAYS,
    DEFAULT_SUBMIT_TIMEOUT_SECS,
};
use shiftsync_domain::{
    Config, CycleReport, EnqueueOptions, Operation, OperationStatus, OperationType,
    OwnerContext, QueueStatus, Result, ShiftSyncError, SyncEvent, SyncStrategy, SyncTrigger,
};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use super::dispatcher::{plan_groups, BatchDispatcher, DispatchGroup};
use super::events::EventBus;
use super::handlers::{OperationResult, TypeHandler};
use super::ids::generate_operation_id;
use super::index::PendingIndex;
use super::network::NetworkMonitor;
use super::ports::{FallbackAction, OperationStore, Submitter, WakeTrigger};
use super::resolver::{DependencyResolver, Readiness};
use super::retention::RetentionCleaner;
use super::retry::{FailureOutcome, RetryManager};
use super::scheduler::RetryScheduler;
use super::strategies::StrategyRegistry;

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long completed/failed rows are kept.
    pub retention: chrono::Duration,
    /// Upper bound for any backoff delay.
    pub max_retry_delay: Duration,
    /// Per submission call.
    pub submit_timeout: Duration,
    /// Broadcast buffer for event subscribers.
    pub event_capacity: usize,
    /// Arm tokio timers for rescheduled operations. When off, retries are
    /// only picked up by later cycles.
    pub retry_timers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: chrono::Duration::days(i64::from(DEFAULT_RETENTION_DAYS)),
            max_retry_delay: Duration::from_secs(DEFAULT_MAX_RETRY_DELAY_SECS),
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            retry_timers: true,
        }
    }
}

impl EngineConfig {
    /// Tuning derived from loaded configuration, with retry timers on
    pub fn from_config(config: &Config) -> Self {
        Self {
            retention: config.sync.retention(),
            max_retry_delay: config.sync.max_retry_delay(),
            submit_timeout: config.submission.timeout(),
            event_capacity: config.sync.event_capacity,
            retry_timers: true,
        }
    }
}

/// Builder for [`SyncEngine`]
pub struct SyncEngineBuilder {
    store: Arc<dyn OperationStore>,
    submitter: Arc<dyn Submitter>,
    clock: Arc<dyn Clock>,
    network: Option<Arc<NetworkMonitor>>,
    events: Option<Arc<EventBus>>,
    strategies: StrategyRegistry,
    wake: Option<Arc<dyn WakeTrigger>>,
    handlers: Vec<Arc<dyn TypeHandler>>,
    config: EngineConfig,
}

impl SyncEngineBuilder {
    /// Builder with the system clock, default strategies and config
    pub fn new(store: Arc<dyn OperationStore>, submitter: Arc<dyn Submitter>) -> Self {
        Self {
            store,
            submitter,
            clock: Arc::new(SystemClock),
            network: None,
            events: None,
            strategies: StrategyRegistry::new(),
            wake: None,
            handlers: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Clock used for scheduling and timestamps
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a network monitor with the host
    pub fn network(mut self, network: Arc<NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    /// Share an event bus with the host
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the whole strategy registry
    pub fn strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    /// Override the strategy for one type
    pub fn strategy(mut self, op_type: OperationType, strategy: SyncStrategy) -> Self {
        self.strategies = self.strategies.with_strategy(op_type, strategy);
        self
    }

    /// Register the action run when an operation of `op_type` fails for good
    pub fn fallback(mut self, op_type: OperationType, action: Arc<dyn FallbackAction>) -> Self {
        self.strategies = self.strategies.with_fallback(op_type, action);
        self
    }

    /// Host hook registered while network-bound work waits offline
    pub fn wake_trigger(mut self, wake: Arc<dyn WakeTrigger>) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Replace the built-in handler for the handler's mode
    pub fn handler(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Engine tuning
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the engine; call [`SyncEngine::initialize`] before use
    pub fn build(self) -> SyncEngine {
        let events =
            self.events.unwrap_or_else(|| Arc::new(EventBus::new(self.config.event_capacity)));
        let network = self.network.unwrap_or_default();
        let strategies = Arc::new(self.strategies);

        let mut dispatcher =
            BatchDispatcher::new(Arc::clone(&self.submitter), self.config.submit_timeout);
        for handler in self.handlers {
            dispatcher = dispatcher.with_handler(handler);
        }

        let retry = RetryManager::new(
            Arc::clone(&self.store),
            Arc::clone(&events),
            Arc::clone(&strategies),
            Arc::clone(&self.clock),
            self.config.max_retry_delay,
        );

        SyncEngine {
            inner: Arc::new(EngineInner {
                resolver: DependencyResolver::new(Arc::clone(&self.store)),
                retention: RetentionCleaner::new(Arc::clone(&self.store), self.config.retention),
                store: self.store,
                clock: self.clock,
                network,
                events,
                strategies,
                dispatcher,
                retry,
                index: PendingIndex::new(),
                scheduler: RetryScheduler::new(),
                wake: self.wake,
                config: self.config,
                syncing: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                wake_registered: AtomicBool::new(false),
                last_sync_at: RwLock::new(None),
            }),
        }
    }
}

struct EngineInner {
    store: Arc<dyn OperationStore>,
    clock: Arc<dyn Clock>,
    network: Arc<NetworkMonitor>,
    events: Arc<EventBus>,
    strategies: Arc<StrategyRegistry>,
    dispatcher: BatchDispatcher,
    retry: RetryManager,
    resolver: DependencyResolver,
    retention: RetentionCleaner,
    index: PendingIndex,
    scheduler: RetryScheduler,
    wake: Option<Arc<dyn WakeTrigger>>,
    config: EngineConfig,
    syncing: AtomicBool,
    shutting_down: AtomicBool,
    wake_registered: AtomicBool,
    last_sync_at: RwLock<Option<DateTime<Utc>>>,
}

/// Releases the single-flight flag on every exit path
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Background sync engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("syncing", &self.is_syncing())
            .field("online", &self.inner.network.is_online())
            .field("pending_index", &self.inner.index.len())
            .field("armed_timers", &self.inner.scheduler.pending())
            .finish()
    }
}

impl SyncEngine {
    /// Start building an engine over `store` and `submitter`
    pub fn builder(
        store: Arc<dyn OperationStore>,
        submitter: Arc<dyn Submitter>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder::new(store, submitter)
    }

    /// Bus carrying operation and cycle events
    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    /// Connectivity and foreground state that gates network-bound work
    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.inner.network
    }

    /// Per-type strategies in effect
    pub fn strategies(&self) -> &StrategyRegistry {
        &self.inner.strategies
    }

    /// True while a cycle holds the single-flight guard
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    /// Start-up recovery
    ///
    /// Resets interrupted `processing` rows, rebuilds the pending index and
    /// re-arms timers for operations scheduled in the future. Returns the
    /// number of recovered rows.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<usize> {
        let recovered = self.inner.store.recover_interrupted().await?;
        if recovered > 0 {
            warn!(recovered, "reset interrupted operations to pending");
        }

        let pending = self.inner.store.query_by_status(OperationStatus::Pending).await?;
        self.inner.index.rebuild(&pending);

        let now = self.inner.clock.now_utc();
        let mut armed = 0usize;
        for operation in pending.iter().filter(|op| !op.is_due(now)) {
            if let Some(at) = operation.scheduled_for {
                self.arm_timer(&operation.id, at);
                armed += 1;
            }
        }

        info!(recovered, pending = pending.len(), timers = armed, "sync engine initialized");
        Ok(recovered)
    }

    /// Persist a new operation and return its id
    ///
    /// Immediate types (or `options.immediate`) are attempted right away when
    /// the network allows; failures there are absorbed and the operation
    /// stays queued.
    #[instrument(skip(self, op_type, payload, options), fields(op_type = tracing::field::Empty))]
    pub async fn enqueue(
        &self,
        op_type: impl Into<OperationType> + Send,
        payload: Value,
        options: EnqueueOptions,
    ) -> Result<String> {
        let op_type = op_type.into();
        tracing::Span::current().record("op_type", op_type.as_str());

        let strategy = self.inner.strategies.strategy_for(&op_type);
        let now = self.inner.clock.now_utc();
        let operation = Operation {
            id: generate_operation_id(&op_type, now),
            op_type: op_type.clone(),
            priority: options.priority.unwrap_or(strategy.priority),
            payload,
            created_at: now,
            updated_at: now,
            scheduled_for: options.scheduled_for,
            retry_count: 0,
            max_retries: options.max_retries.unwrap_or(strategy.max_retries),
            last_attempt: None,
            status: OperationStatus::Pending,
            network_required: options.network_required.unwrap_or(strategy.network_required),
            dependencies: options.dependencies,
            owner: options.owner,
            last_error: None,
        };

        self.inner.store.put(&operation).await?;
        self.inner.index.insert(&operation.op_type, &operation.id);

        debug!(operation_id = %operation.id, priority = %operation.priority, "operation queued");
        self.inner.events.emit(SyncEvent::OperationQueued {
            operation_id: operation.id.clone(),
            op_type,
            priority: operation.priority,
        });

        if let Some(at) = operation.scheduled_for.filter(|at| *at > now) {
            self.arm_timer(&operation.id, at);
        }

        let immediate = options.immediate.unwrap_or(strategy.immediate);
        if immediate && operation.is_due(now) && self.network_allows(&operation) {
            if let Err(err) = self.attempt_operation(&operation.id).await {
                warn!(operation_id = %operation.id, error = %err, "immediate attempt failed");
            }
        }

        Ok(operation.id)
    }

    /// Queue an emergency report (critical, immediate)
    pub async fn report_emergency(&self, payload: Value, owner: OwnerContext) -> Result<String> {
        self.enqueue(OperationType::EmergencyReport, payload, EnqueueOptions::new().owner(owner))
            .await
    }

    /// Queue a form submission; the payload must be a JSON object
    pub async fn submit_form(&self, payload: Value, owner: OwnerContext) -> Result<String> {
        if !payload.is_object() {
            return Err(ShiftSyncError::InvalidInput(
                "form submission payload must be a JSON object".to_string(),
            ));
        }
        self.enqueue(OperationType::FormSubmission, payload, EnqueueOptions::new().owner(owner))
            .await
    }

    /// Queue a shift action; options carry ordering dependencies such as a
    /// clock-out waiting on its clock-in
    pub async fn record_shift_action(
        &self,
        payload: Value,
        options: EnqueueOptions,
    ) -> Result<String> {
        self.enqueue(OperationType::ShiftAction, payload, options).await
    }

    /// Queue an SOP view for batched delivery
    pub async fn record_sop_access(&self, payload: Value, owner: OwnerContext) -> Result<String> {
        self.enqueue(OperationType::SopAccess, payload, EnqueueOptions::new().owner(owner)).await
    }

    /// Queue a training progress update; `moduleId` is required for merging
    pub async fn record_training_progress(
        &self,
        payload: Value,
        owner: OwnerContext,
    ) -> Result<String> {
        let has_module = payload
            .get("moduleId")
            .is_some_and(|module| module.is_string() || module.is_number());
        if !has_module {
            return Err(ShiftSyncError::InvalidInput(
                "training progress requires a moduleId".to_string(),
            ));
        }
        self.enqueue(OperationType::TrainingProgress, payload, EnqueueOptions::new().owner(owner))
            .await
    }

    /// Queue an audit log entry (low priority, batched)
    pub async fn record_audit(&self, payload: Value, owner: OwnerContext) -> Result<String> {
        self.enqueue(OperationType::AuditLog, payload, EnqueueOptions::new().owner(owner)).await
    }

    /// Run one sync cycle
    ///
    /// Returns `Ok(None)` when another cycle is already running or the
    /// engine is shutting down.
    pub async fn run_cycle(&self, trigger: SyncTrigger) -> Result<Option<CycleReport>> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            debug!(%trigger, "engine shutting down, cycle skipped");
            return Ok(None);
        }
        let Some(guard) = CycleGuard::acquire(&self.inner.syncing) else {
            debug!(%trigger, "cycle already running, request coalesced");
            return Ok(None);
        };

        let cycle_id = Uuid::now_v7().to_string();
        let span = info_span!("sync_cycle", cycle_id = %cycle_id, %trigger);

        self.inner.events.emit(SyncEvent::SyncStarted { cycle_id: cycle_id.clone(), trigger });
        let outcome = self.execute_cycle().instrument(span).await;
        drop(guard);

        match outcome {
            Ok(report) => {
                *self.inner.last_sync_at.write() = Some(self.inner.clock.now_utc());
                info!(
                    cycle_id = %cycle_id,
                    dispatched = report.dispatched,
                    completed = report.completed,
                    retried = report.retried,
                    failed = report.failed,
                    deferred = report.deferred,
                    purged = report.purged,
                    "sync cycle completed"
                );
                self.inner
                    .events
                    .emit(SyncEvent::SyncCompleted { cycle_id, report: report.clone() });
                Ok(Some(report))
            }
            Err(err) => {
                error!(cycle_id = %cycle_id, error = %err, "sync cycle failed");
                self.inner.events.emit(SyncEvent::SyncFailed { cycle_id, error: err.to_string() });
                Err(err)
            }
        }
    }

    async fn execute_cycle(&self) -> Result<CycleReport> {
        let inner = &self.inner;
        let now = inner.clock.now_utc();
        let online = inner.network.is_online();
        let mut report = CycleReport::default();

        let pending = inner.store.query_by_status(OperationStatus::Pending).await?;
        inner.index.rebuild(&pending);

        let mut candidates = Vec::with_capacity(pending.len());
        for operation in pending {
            if !operation.is_due(now) {
                report.not_due += 1;
            } else if operation.network_required && !online {
                report.offline += 1;
            } else {
                candidates.push(operation);
            }
        }

        let readiness = inner.resolver.resolve(&candidates).await?;
        let mut ready = Vec::with_capacity(candidates.len());
        for operation in candidates {
            match readiness.get(&operation.id) {
                Some(Readiness::Ready) => ready.push(operation),
                Some(Readiness::DependencyFailed { dependency_id }) => {
                    let reason = format!("dependency {dependency_id} failed");
                    inner.index.remove(&operation.op_type, &operation.id);
                    inner.retry.fail(operation, &reason).await?;
                    report.failed += 1;
                }
                Some(Readiness::Blocked { .. }) | None => report.blocked += 1,
            }
        }

        ready.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));

        let plan = plan_groups(ready, &inner.strategies);
        report.over_batch_cap = plan.over_cap.len();

        let mut first_error = None;
        for group in plan.groups {
            if let Err(err) = self.run_group(group, &mut report).await {
                error!(error = %err, "failed to settle dispatch group");
                first_error.get_or_insert(err);
            }
        }

        let stats = inner.retention.run(inner.clock.now_utc()).await?;
        report.purged = stats.purged;

        self.update_wake_registration(online, report.offline).await;

        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Claim, dispatch and settle one group
    async fn run_group(&self, mut group: DispatchGroup, report: &mut CycleReport) -> Result<()> {
        let ids: Vec<String> = group.operations.iter().map(|op| op.id.clone()).collect();
        let claimed = self.claim(&ids).await?;
        if claimed.is_empty() {
            return Ok(());
        }

        report.dispatched += claimed.len();
        group.operations = claimed;
        let results = self.inner.dispatcher.dispatch(group).await;
        self.settle_all(results, report).await
    }

    async fn claim(&self, ids: &[String]) -> Result<Vec<Operation>> {
        let now = self.inner.clock.now_utc();
        let claimed = self.inner.store.claim(ids, now).await?;
        for operation in &claimed {
            self.inner.index.remove(&operation.op_type, &operation.id);
            self.inner.events.emit(SyncEvent::OperationProcessing {
                operation_id: operation.id.clone(),
                op_type: operation.op_type.clone(),
            });
        }
        Ok(claimed)
    }

    async fn settle_all(
        &self,
        results: Vec<OperationResult>,
        report: &mut CycleReport,
    ) -> Result<()> {
        let mut first_error = None;
        for result in results {
            let operation_id = result.operation.id.clone();
            if let Err(err) = self.settle(result, report).await {
                error!(operation_id = %operation_id, error = %err, "failed to persist outcome");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn settle(&self, result: OperationResult, report: &mut CycleReport) -> Result<()> {
        let OperationResult { operation, result } = result;
        match result {
            Ok(confirmation_id) => {
                self.complete(operation, confirmation_id).await?;
                report.completed += 1;
            }
            Err(failure) => {
                let (id, op_type) = (operation.id.clone(), operation.op_type.clone());
                match self.inner.retry.handle_failure(operation, &failure).await? {
                    FailureOutcome::Deferred => {
                        self.inner.index.insert(&op_type, &id);
                        report.deferred += 1;
                    }
                    FailureOutcome::Rescheduled { scheduled_for, .. } => {
                        self.inner.index.insert(&op_type, &id);
                        self.arm_timer(&id, scheduled_for);
                        report.retried += 1;
                    }
                    FailureOutcome::Failed { .. } => report.failed += 1,
                }
            }
        }
        Ok(())
    }

    async fn complete(&self, mut operation: Operation, confirmation_id: Option<String>) -> Result<()> {
        let now = self.inner.clock.now_utc();
        operation.status = OperationStatus::Completed;
        operation.last_error = None;
        operation.updated_at = now;
        self.inner.store.put(&operation).await?;
        self.inner.scheduler.cancel(&operation.id);

        debug!(operation_id = %operation.id, confirmation_id = ?confirmation_id, "operation completed");
        self.inner.events.emit(SyncEvent::OperationCompleted {
            operation_id: operation.id.clone(),
            op_type: operation.op_type.clone(),
            confirmation_id: confirmation_id.clone(),
        });

        let strategy = self.inner.strategies.strategy_for(&operation.op_type);
        if let Some(name) = strategy.confirmation_event {
            self.inner.events.emit(SyncEvent::Domain {
                name,
                operation_id: operation.id,
                op_type: operation.op_type,
                confirmation_id,
            });
        }
        Ok(())
    }

    /// Claim-then-dispatch for a single operation
    ///
    /// Shared by immediate delivery, retry timers and `retry_operation`.
    /// Returns the resulting status, or `None` when the operation was not
    /// eligible (unknown, not pending, not due, offline, blocked, or claimed
    /// elsewhere).
    #[instrument(skip(self))]
    pub async fn attempt_operation(&self, id: &str) -> Result<Option<OperationStatus>> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Ok(None);
        }
        let Some(operation) = self.inner.store.get(id).await? else {
            return Ok(None);
        };
        let now = self.inner.clock.now_utc();
        if operation.status != OperationStatus::Pending
            || !operation.is_due(now)
            || !self.network_allows(&operation)
        {
            return Ok(None);
        }

        match self.inner.resolver.readiness(&operation).await? {
            Readiness::Ready => {}
            Readiness::Blocked { waiting_on } => {
                debug!(operation_id = id, ?waiting_on, "operation blocked on dependencies");
                return Ok(None);
            }
            Readiness::DependencyFailed { dependency_id } => {
                self.inner.index.remove(&operation.op_type, &operation.id);
                let reason = format!("dependency {dependency_id} failed");
                self.inner.retry.fail(operation, &reason).await?;
                return Ok(Some(OperationStatus::Failed));
            }
        }

        let claimed = self.claim(&[operation.id.clone()]).await?;
        let Some(claimed_op) = claimed.into_iter().next() else {
            return Ok(None);
        };

        let group = DispatchGroup {
            op_type: claimed_op.op_type.clone(),
            strategy: self.inner.strategies.strategy_for(&claimed_op.op_type),
            operations: vec![claimed_op],
        };
        let results = self.inner.dispatcher.dispatch(group).await;
        let mut report = CycleReport::default();
        self.settle_all(results, &mut report).await?;

        Ok(self.inner.store.get(id).await?.map(|op| op.status))
    }

    /// Move every failed operation back to pending with a fresh retry
    /// budget, then ask for a cycle
    #[instrument(skip(self))]
    pub async fn retry_failed(&self) -> Result<usize> {
        let reset = self.inner.store.reset_failed(self.inner.clock.now_utc()).await?;
        if reset > 0 {
            let pending = self.inner.store.query_by_status(OperationStatus::Pending).await?;
            self.inner.index.rebuild(&pending);
            info!(reset, "failed operations reset");
            self.inner.network.request_sync(SyncTrigger::Explicit);
        }
        Ok(reset)
    }

    /// Retry one operation now
    ///
    /// Failed operations get a fresh retry budget; pending ones lose their
    /// backoff delay. Returns false for completed or processing operations.
    #[instrument(skip(self))]
    pub async fn retry_operation(&self, id: &str) -> Result<bool> {
        let now = self.inner.clock.now_utc();
        let Some(operation) = self.inner.store.reset_for_retry(id, now).await? else {
            return match self.inner.store.get(id).await? {
                Some(_) => Ok(false),
                None => Err(ShiftSyncError::NotFound(format!("operation {id}"))),
            };
        };

        self.inner.scheduler.cancel(id);
        self.inner.index.insert(&operation.op_type, id);

        if let Err(err) = self.attempt_operation(id).await {
            warn!(operation_id = id, error = %err, "manual retry attempt failed");
        }
        Ok(true)
    }

    /// Current stored state of one operation
    pub async fn get_operation(&self, id: &str) -> Result<Option<Operation>> {
        self.inner.store.get(id).await
    }

    /// Counts per status plus pending work per type
    pub async fn queue_status(&self) -> Result<QueueStatus> {
        let counts = self.inner.store.status_counts().await?;
        Ok(QueueStatus {
            counts,
            pending_by_type: self.inner.index.counts(),
            online: self.inner.network.is_online(),
            syncing: self.is_syncing(),
            last_sync_at: *self.inner.last_sync_at.read(),
        })
    }

    /// Stop starting cycles and retry timers; in-flight work finishes
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.scheduler.shutdown();
        info!("sync engine shut down");
    }

    /// True once [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Acquire)
    }

    fn network_allows(&self, operation: &Operation) -> bool {
        !operation.network_required || self.inner.network.is_online()
    }

    fn arm_timer(&self, id: &str, at: DateTime<Utc>) {
        if !self.inner.config.retry_timers {
            return;
        }
        let delay = (at - self.inner.clock.now_utc()).to_std().unwrap_or(Duration::ZERO);
        let task = retry_task(Arc::downgrade(&self.inner), id.to_string());
        self.inner.scheduler.schedule(id, delay, task);
    }

    async fn update_wake_registration(&self, online: bool, offline_pending: usize) {
        let Some(wake) = &self.inner.wake else {
            return;
        };

        if !online && offline_pending > 0 {
            match wake.register(offline_pending).await {
                Ok(()) => {
                    self.inner.wake_registered.store(true, Ordering::Release);
                    debug!(pending = offline_pending, "wake trigger registered");
                }
                Err(err) => warn!(error = %err, "wake trigger registration failed"),
            }
        } else if online && self.inner.wake_registered.swap(false, Ordering::AcqRel) {
            if let Err(err) = wake.cancel().await {
                warn!(error = %err, "wake trigger cancel failed");
            }
        }
    }
}

/// Timer body; holds only a weak reference so timers never keep the engine
/// alive
fn retry_task(inner: Weak<EngineInner>, id: String) -> BoxFuture<'static, ()> {
    async move {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let engine = SyncEngine { inner };
        match engine.attempt_operation(&id).await {
            Ok(Some(status)) => debug!(operation_id = %id, %status, "timed retry ran"),
            Ok(None) => debug!(operation_id = %id, "timed retry not eligible, left for next cycle"),
            Err(err) => warn!(operation_id = %id, error = %err, "timed retry failed"),
        }
    }
    .boxed()
}
