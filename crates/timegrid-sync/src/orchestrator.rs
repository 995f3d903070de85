//! Sync orchestrator - replays the mutation queue against the remote API
//!
//! ## Operation lifecycle
//!
//! ```text
//! Pending ──→ InFlight ──→ Committed            (removed, shadow deleted)
//!                     ├──→ Pending (retry + 1)   (failure, retries left)
//!                     └──→ Dropped              (removed, shadow deleted, logged)
//! ```
//!
//! One drain makes a single attempt per queued operation, in FIFO order.
//! Every failure is retried on later drains until the operation has been
//! attempted `1 + max_retries` times, whatever the error. A rejected write,
//! a malformed operation or a missing handler is only logged louder. A
//! failing operation does not block the ones behind it.
//!
//! ## Concurrency
//!
//! An `is_syncing` latch (compare-exchange, released by a drop guard) makes
//! concurrent drains no-ops. Triggers are [`SyncOrchestrator::submit`] while
//! online and every offline→online transition seen by
//! [`SyncOrchestrator::run`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use timegrid_core::config::SyncConfig;
use timegrid_core::domain::{
    ConnectivityStatus, DomainError, DrainSummary, EntityType, OperationId, OperationKind,
    OperationState, QueuedOperation, ShadowRecord, SyncEvent, SyncStatusEvent, MAX_RETRIES,
};
use timegrid_core::ports::{
    ApplyOutcome, IClock, IEventSink, INetworkStatus, IStorageEngine, RemoteError, SystemClock,
};

use crate::{EntityCache, HandlerRegistry, MutationQueue, ShadowStore, SyncError};

// ============================================================================
// Settings and outcomes
// ============================================================================

/// Tunables of the drain loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Retries granted after the first failed attempt
    pub max_retries: u32,
    /// Pause between consecutive remote calls within one drain
    pub request_spacing: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            request_spacing: Duration::from_millis(100),
        }
    }
}

impl From<&SyncConfig> for OrchestratorSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            request_spacing: Duration::from_millis(config.request_spacing_ms),
        }
    }
}

/// Result of a `drain()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain held the latch; nothing was done
    AlreadyRunning,
    /// No connectivity; nothing was done
    Offline,
    /// A pass ran over the queue snapshot
    Completed(DrainSummary),
}

/// Releases the `is_syncing` latch when dropped
struct SyncingGuard<'a>(&'a AtomicBool);

impl<'a> SyncingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Logs an illegal transition; the operation stays queued untouched
fn refuse(op: &QueuedOperation, state: OperationState, err: DomainError) -> OperationState {
    error!(op_id = %op.id(), error = %err, "Operation left in place");
    state
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Drains the mutation queue whenever connectivity allows
///
/// ## Dependencies
///
/// - `storage`: backend for shadow records and the entity cache
/// - `queue`: the persisted mutation queue
/// - `handlers`: remote write handlers per `(entity type, kind)`
/// - `network`: connectivity state and transitions
/// - `events`: UI-level event sink
pub struct SyncOrchestrator {
    queue: Arc<MutationQueue>,
    shadows: ShadowStore,
    cache: EntityCache,
    handlers: HandlerRegistry,
    network: Arc<dyn INetworkStatus>,
    events: Arc<dyn IEventSink>,
    clock: Arc<dyn IClock>,
    settings: OrchestratorSettings,
    syncing: AtomicBool,
    last_synced_at: RwLock<Option<DateTime<Utc>>>,
}

impl SyncOrchestrator {
    pub fn new(
        storage: Arc<dyn IStorageEngine>,
        queue: Arc<MutationQueue>,
        handlers: HandlerRegistry,
        network: Arc<dyn INetworkStatus>,
        events: Arc<dyn IEventSink>,
    ) -> Self {
        Self {
            queue,
            shadows: ShadowStore::new(storage.clone()),
            cache: EntityCache::new(storage),
            handlers,
            network,
            events,
            clock: Arc::new(SystemClock),
            settings: OrchestratorSettings::default(),
            syncing: AtomicBool::new(false),
            last_synced_at: RwLock::new(None),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn IClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn queue(&self) -> &Arc<MutationQueue> {
        &self.queue
    }

    /// Whether a drain is in progress
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    // ========================================================================
    // Submit
    // ========================================================================

    /// Queues a write and, when online, drains right away
    ///
    /// A `Create` also gets a shadow record so it is visible offline.
    /// Returns once the operation is persisted and the triggered drain (if
    /// any) has finished.
    ///
    /// # Errors
    ///
    /// Fails if the operation is invalid or could not be persisted; the
    /// write was not queued in that case.
    #[tracing::instrument(skip_all, fields(entity = %entity_type, kind = %kind))]
    pub async fn submit(
        &self,
        kind: OperationKind,
        entity_type: EntityType,
        payload: Value,
    ) -> Result<OperationId, SyncError> {
        let op = QueuedOperation::new(kind, entity_type, payload, self.clock.now());
        let id = *op.id();
        let entity_type = op.entity_type().clone();

        // The shadow goes first so a concurrent drain never commits the
        // operation before its shadow exists.
        let shadowed = kind == OperationKind::Create;
        if shadowed {
            if let Err(e) = self.shadows.put(&ShadowRecord::for_operation(&op)).await {
                warn!(op_id = %id, error = %e, "Operation will be queued without shadow record");
            }
        }

        if let Err(e) = self.queue.push(op).await {
            if shadowed {
                if let Err(cleanup) = self.shadows.remove(&entity_type, &id).await {
                    warn!(op_id = %id, error = %cleanup, "Shadow of unqueued operation left behind");
                }
            }
            return Err(e);
        }

        info!(op_id = %id, "Operation queued");
        self.emit_status().await;

        if self.network.is_online() {
            self.drain().await;
        }
        Ok(id)
    }

    // ========================================================================
    // Drain
    // ========================================================================

    /// Makes one pass over the queue
    #[tracing::instrument(skip(self))]
    pub async fn drain(&self) -> DrainOutcome {
        if !self.network.is_online() {
            debug!("Offline, drain skipped");
            return DrainOutcome::Offline;
        }
        let Some(guard) = SyncingGuard::acquire(&self.syncing) else {
            debug!("Drain already running");
            return DrainOutcome::AlreadyRunning;
        };

        self.emit_status().await;

        let snapshot = self.queue.peek_all().await;
        info!(pending = snapshot.len(), "Drain started");

        let mut summary = DrainSummary::default();
        for (index, op) in snapshot.iter().enumerate() {
            if index > 0 && !self.settings.request_spacing.is_zero() {
                tokio::time::sleep(self.settings.request_spacing).await;
            }
            if !self.network.is_online() {
                info!(remaining = snapshot.len() - index, "Connectivity lost, stopping drain");
                break;
            }

            let state = self.process(op).await;
            match state {
                OperationState::Committed => summary.synced_count += 1,
                OperationState::Pending => summary.failed_count += 1,
                OperationState::Dropped => {
                    summary.failed_count += 1;
                    summary.dropped_count += 1;
                }
                OperationState::InFlight => {}
            }
        }

        summary.remaining_queue_size = self.queue.size().await;
        *self.last_synced_at.write().await = Some(self.clock.now());

        info!(
            synced = summary.synced_count,
            failed = summary.failed_count,
            dropped = summary.dropped_count,
            remaining = summary.remaining_queue_size,
            "Drain finished"
        );

        self.events.emit(SyncEvent::DrainSummary(summary));
        self.events.emit(SyncEvent::SyncComplete {
            synced_count: summary.synced_count,
            failed_count: summary.failed_count,
        });
        drop(guard);
        self.emit_status().await;

        DrainOutcome::Completed(summary)
    }

    /// Applies one operation and settles it; returns its resulting state
    async fn process(&self, op: &QueuedOperation) -> OperationState {
        let in_flight = match OperationState::Pending.transition_to(OperationState::InFlight) {
            Ok(state) => state,
            Err(e) => return refuse(op, OperationState::Pending, e),
        };
        debug!(op_id = %op.id(), kind = %op.kind(), entity = %op.entity_type(), "Applying operation");

        let result = match self.handlers.get(op.entity_type(), op.kind()) {
            Some(handler) => handler.apply(op).await,
            None => Err(RemoteError::InvalidOperation(format!(
                "no handler registered for {} {}",
                op.kind(),
                op.entity_type()
            ))),
        };

        let target = match &result {
            Ok(_) => OperationState::Committed,
            Err(_) if op.can_retry(self.settings.max_retries) => OperationState::Pending,
            Err(_) => OperationState::Dropped,
        };
        let next = match in_flight.transition_to(target) {
            Ok(state) => state,
            Err(e) => return refuse(op, in_flight, e),
        };

        match result {
            Ok(outcome) => self.commit(op, outcome).await,
            Err(err) if next == OperationState::Pending => self.retry(op, &err).await,
            Err(err) => self.drop_operation(op, &err).await,
        }
        debug!(op_id = %op.id(), state = %next, removed = next.is_terminal(), "Operation settled");
        next
    }

    async fn commit(&self, op: &QueuedOperation, outcome: ApplyOutcome) {
        // Queue first: a crash before the shadow delete leaves an orphan
        // shadow, which `ShadowStore::sweep_orphans` cleans up at startup.
        if let Err(e) = self.queue.remove(op.id()).await {
            error!(op_id = %op.id(), error = %e, "Committed operation could not be removed from queue");
            return;
        }
        if op.kind() == OperationKind::Create {
            if let Err(e) = self.shadows.remove(op.entity_type(), op.id()).await {
                warn!(op_id = %op.id(), error = %e, "Failed to delete shadow record");
            }
        }

        let cached = match &outcome {
            ApplyOutcome::Created(entity) => self.cache.put(op.entity_type(), entity).await.map(|_| ()),
            ApplyOutcome::Updated => match op.remote_id() {
                Some(id) => self
                    .cache
                    .merge(op.entity_type(), &id, op.payload())
                    .await
                    .map(|_| ()),
                None => Ok(()),
            },
            ApplyOutcome::Deleted => match op.remote_id() {
                Some(id) => self.cache.remove(op.entity_type(), &id).await,
                None => Ok(()),
            },
        };
        if let Err(e) = cached {
            warn!(op_id = %op.id(), error = %e, "Entity cache not updated");
        }

        debug!(op_id = %op.id(), "Operation committed");
    }

    /// Keeps a failed operation queued with one more retry counted
    async fn retry(&self, op: &QueuedOperation, err: &RemoteError) {
        match self.queue.record_failure(op.id()).await {
            Ok(retry_count) if err.is_transient() => warn!(
                op_id = %op.id(),
                retry_count,
                max_retries = self.settings.max_retries,
                error = %err,
                "Operation failed, will retry"
            ),
            Ok(retry_count) => error!(
                op_id = %op.id(),
                retry_count,
                max_retries = self.settings.max_retries,
                error = %err,
                "Operation refused by the remote, will retry"
            ),
            Err(e) => error!(op_id = %op.id(), error = %e, "Failed to record retry"),
        }
    }

    /// Removes an operation whose retries are spent
    async fn drop_operation(&self, op: &QueuedOperation, err: &RemoteError) {
        error!(
            op_id = %op.id(),
            kind = %op.kind(),
            entity = %op.entity_type(),
            attempts = op.retry_count() + 1,
            transient = err.is_transient(),
            error = %err,
            "Dropping operation"
        );
        if let Err(e) = self.queue.remove(op.id()).await {
            error!(op_id = %op.id(), error = %e, "Dropped operation could not be removed from queue");
        }
        if op.kind() == OperationKind::Create {
            if let Err(e) = self.shadows.remove(op.entity_type(), op.id()).await {
                warn!(op_id = %op.id(), error = %e, "Failed to delete shadow record");
            }
        }
    }

    // ========================================================================
    // Triggers and status
    // ========================================================================

    /// Drains on every transition to online until `shutdown` is cancelled
    ///
    /// Also drains once at start if already online.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut connectivity = self.network.subscribe();
        info!("Sync orchestrator started");

        if *connectivity.borrow_and_update() {
            self.drain().await;
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, sync orchestrator stopping");
                    break;
                }
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        info!("Connectivity source closed, sync orchestrator stopping");
                        break;
                    }
                    let online = *connectivity.borrow_and_update();
                    self.emit_status().await;
                    if online {
                        self.drain().await;
                    }
                }
            }
        }

        info!("Sync orchestrator stopped");
    }

    /// Re-reads the queue after another process changed the store
    pub async fn on_storage_changed(&self) -> Result<(), SyncError> {
        self.queue.reload().await?;
        self.emit_status().await;
        Ok(())
    }

    /// Current connectivity and queue state
    pub async fn status(&self) -> SyncStatusEvent {
        SyncStatusEvent {
            status: ConnectivityStatus::from_online(self.network.is_online()),
            syncing: self.is_syncing(),
            queue_size: self.queue.size().await,
            last_synced_at: *self.last_synced_at.read().await,
        }
    }

    async fn emit_status(&self) {
        let status = self.status().await;
        self.events.emit(SyncEvent::SyncStatus(status));
    }
}
