//! Tiered storage with a one-time engine choice
//!
//! [`TieredStorage`] probes the preferred engine on `initialize()` and falls
//! back to the constrained engine when the preferred one cannot be opened.
//! Once resolved, every call is forwarded to that engine for the lifetime
//! of the value; there is no fail-over mid-session.
//!
//! ## Legacy migration
//!
//! When the preferred engine opens, data a previous session left in the
//! fallback engine is moved across, one namespace at a time:
//!
//! 1. every record of the namespace is merged into the preferred engine
//! 2. only after all merges succeeded is the fallback namespace cleared
//!
//! Merging never overwrites: a record the preferred engine lacks is copied,
//! two array records (the pending queue) are joined by element `id`, and any
//! other clash keeps the preferred value. An interrupted pass leaves the
//! fallback data in place, so running it again converges to the same
//! contents. A `_meta/migration` marker records the first full pass; later
//! sessions still pick up whatever a degraded session wrote to the fallback
//! in the meantime, so queued writes are never stranded there.
//!
//! ## Quota
//!
//! With a [`QuotaMonitor`] attached, usage is checked once the engine is
//! resolved and after every successful `put`. The warning latch belongs to
//! the resolved state, so one warning is emitted per initialization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use timegrid_core::domain::{BackendKind, QuotaSnapshot, Record, NS_META};
use timegrid_core::ports::{IEngineProvider, IStorageEngine, StorageError, StorageEstimate};

use crate::QuotaMonitor;

/// Record id of the migration marker inside the `_meta` namespace
pub const MIGRATION_MARKER_ID: &str = "migration";

struct Resolved {
    engine: Arc<dyn IStorageEngine>,
    kind: BackendKind,
    quota_warned: AtomicBool,
}

impl Resolved {
    fn new(engine: Arc<dyn IStorageEngine>, kind: BackendKind) -> Self {
        Self {
            engine,
            kind,
            quota_warned: AtomicBool::new(false),
        }
    }
}

/// Storage backend that picks one engine at startup
pub struct TieredStorage {
    preferred: Arc<dyn IEngineProvider>,
    fallback: Arc<dyn IEngineProvider>,
    namespaces: Vec<String>,
    migrate_legacy: bool,
    quota: Option<QuotaMonitor>,
    resolved: OnceCell<Resolved>,
}

impl TieredStorage {
    /// Creates an uninitialized backend over the two engine providers
    pub fn new(preferred: Arc<dyn IEngineProvider>, fallback: Arc<dyn IEngineProvider>) -> Self {
        Self {
            preferred,
            fallback,
            namespaces: Vec::new(),
            migrate_legacy: true,
            quota: None,
            resolved: OnceCell::new(),
        }
    }

    /// Sets the namespaces carried over by the legacy migration
    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Enables or disables the legacy migration
    pub fn with_migration(mut self, enabled: bool) -> Self {
        self.migrate_legacy = enabled;
        self
    }

    /// Watches usage with `monitor` from `initialize()` on
    pub fn with_quota_monitor(mut self, monitor: QuotaMonitor) -> Self {
        self.quota = Some(monitor);
        self
    }

    /// Resolves the engine; later calls return the first result
    ///
    /// # Errors
    ///
    /// Fails only if neither engine can be opened. Migration, quota and
    /// persistence-request failures are logged and do not fail
    /// initialization.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&self) -> Result<BackendKind, StorageError> {
        let resolved = self
            .resolved
            .get_or_try_init(|| async { self.resolve().await })
            .await?;
        self.watch_quota().await;
        Ok(resolved.kind)
    }

    /// Backend chosen by `initialize()`, if it ran
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.resolved.get().map(|r| r.kind)
    }

    /// Whether `initialize()` has resolved an engine
    pub fn is_initialized(&self) -> bool {
        self.resolved.initialized()
    }

    /// The resolved engine
    pub fn engine(&self) -> Result<&Arc<dyn IStorageEngine>, StorageError> {
        self.resolved
            .get()
            .map(|r| &r.engine)
            .ok_or(StorageError::NotInitialized)
    }

    /// Current usage of the resolved engine
    pub async fn snapshot(&self) -> Result<QuotaSnapshot, StorageError> {
        let resolved = self.resolved.get().ok_or(StorageError::NotInitialized)?;
        let estimate = resolved.engine.estimate().await?;
        Ok(QuotaSnapshot {
            used_bytes: estimate.used_bytes,
            capacity_bytes: estimate.capacity_bytes,
            backend_kind: resolved.kind,
            engine: resolved.engine.name().to_string(),
            is_persistent: resolved.engine.is_persistent(),
        })
    }

    /// Compares usage against the monitor's threshold
    ///
    /// Returns `true` only for the call that emitted the warning, and
    /// `false` when no monitor is attached.
    pub async fn check_quota(&self) -> Result<bool, StorageError> {
        let resolved = self.resolved.get().ok_or(StorageError::NotInitialized)?;
        let Some(monitor) = &self.quota else {
            return Ok(false);
        };
        let snapshot = self.snapshot().await?;
        Ok(monitor.evaluate(&snapshot, &resolved.quota_warned))
    }

    /// Whether the storage warning was emitted since `initialize()`
    pub fn quota_warned(&self) -> bool {
        self.resolved
            .get()
            .is_some_and(|r| r.quota_warned.load(Ordering::SeqCst))
    }

    async fn watch_quota(&self) {
        if let Err(e) = self.check_quota().await {
            warn!(error = %e, "Storage quota check failed");
        }
    }

    async fn resolve(&self) -> Result<Resolved, StorageError> {
        match self.preferred.open().await {
            Ok(engine) => {
                info!(engine = engine.name(), "Using preferred storage engine");
                self.request_persistence(engine.as_ref()).await;
                if self.migrate_legacy {
                    if let Err(e) = self.migrate_from_fallback(engine.as_ref()).await {
                        warn!(error = %e, "Legacy storage migration incomplete; will retry next start");
                    }
                }
                Ok(Resolved::new(engine, BackendKind::Preferred))
            }
            Err(preferred_err) => {
                warn!(
                    engine = self.preferred.name(),
                    error = %preferred_err,
                    "Preferred storage engine unavailable, using fallback"
                );
                let engine = self.fallback.open().await?;
                info!(engine = engine.name(), "Using fallback storage engine");
                Ok(Resolved::new(engine, BackendKind::Fallback))
            }
        }
    }

    async fn request_persistence(&self, engine: &dyn IStorageEngine) {
        match engine.request_persistence().await {
            Ok(true) => debug!(engine = engine.name(), "Durable persistence granted"),
            Ok(false) => warn!(engine = engine.name(), "Durable persistence not granted"),
            Err(e) => warn!(engine = engine.name(), error = %e, "Durable persistence request failed"),
        }
    }

    /// Moves known namespaces from the fallback engine into `target`
    ///
    /// Returns the number of records merged.
    async fn migrate_from_fallback(&self, target: &dyn IStorageEngine) -> Result<usize, StorageError> {
        let migrated_before = target.get(NS_META, MIGRATION_MARKER_ID).await?.is_some();

        let source = match self.fallback.open().await {
            Ok(source) => source,
            Err(e) => {
                debug!(error = %e, "No legacy storage to migrate");
                return Ok(0);
            }
        };

        let mut merged = 0;
        for namespace in &self.namespaces {
            let records = source.get_all(namespace).await?;
            if records.is_empty() {
                continue;
            }
            for record in &records {
                let existing = target.get(namespace, &record.id).await?;
                if let Some(data) = merge_value(existing, &record.data) {
                    target.put(namespace, &Record::new(record.id.clone(), data)).await?;
                }
            }
            source.clear(namespace).await?;
            merged += records.len();
            debug!(namespace = %namespace, records = records.len(), "Migrated namespace");
        }

        if migrated_before {
            if merged > 0 {
                info!(records = merged, from = source.name(), "Recovered records left in fallback storage");
            } else {
                debug!("Legacy storage already migrated");
            }
            return Ok(merged);
        }

        target
            .put(NS_META, &migration_marker(source.name(), merged))
            .await?;
        info!(records = merged, from = source.name(), "Legacy storage migration complete");
        Ok(merged)
    }
}

/// Combines a fallback value with what the target holds under the same id
///
/// Returns the value to write, or `None` when the target already has
/// everything.
fn merge_value(existing: Option<Value>, incoming: &Value) -> Option<Value> {
    match (existing, incoming) {
        (None, incoming) => Some(incoming.clone()),
        (Some(Value::Array(mut current)), Value::Array(items)) => {
            let before = current.len();
            for item in items {
                if !current.iter().any(|c| same_element(c, item)) {
                    current.push(item.clone());
                }
            }
            (current.len() > before).then_some(Value::Array(current))
        }
        (Some(_), _) => None,
    }
}

fn same_element(a: &Value, b: &Value) -> bool {
    match (a.get("id"), b.get("id")) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn migration_marker(source: &str, records: usize) -> Record {
    Record::new(
        MIGRATION_MARKER_ID,
        json!({
            "completedAt": Utc::now().to_rfc3339(),
            "source": source,
            "records": records,
        }),
    )
}

#[async_trait::async_trait]
impl IStorageEngine for TieredStorage {
    fn name(&self) -> &'static str {
        self.resolved
            .get()
            .map(|r| r.engine.name())
            .unwrap_or("uninitialized")
    }

    fn is_persistent(&self) -> bool {
        self.resolved
            .get()
            .is_some_and(|r| r.engine.is_persistent())
    }

    async fn get(&self, namespace: &str, id: &str) -> Result<Option<Value>, StorageError> {
        self.engine()?.get(namespace, id).await
    }

    async fn get_all(&self, namespace: &str) -> Result<Vec<Record>, StorageError> {
        self.engine()?.get_all(namespace).await
    }

    async fn put(&self, namespace: &str, record: &Record) -> Result<(), StorageError> {
        self.engine()?.put(namespace, record).await?;
        self.watch_quota().await;
        Ok(())
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
        self.engine()?.delete(namespace, id).await
    }

    async fn clear(&self, namespace: &str) -> Result<(), StorageError> {
        self.engine()?.clear(namespace).await
    }

    async fn estimate(&self) -> Result<StorageEstimate, StorageError> {
        self.engine()?.estimate().await
    }

    async fn request_persistence(&self) -> Result<bool, StorageError> {
        self.engine()?.request_persistence().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{MemoryEngine, MemoryEngineProvider};

    fn providers() -> (Arc<MemoryEngine>, Arc<MemoryEngine>, TieredStorage) {
        let preferred = Arc::new(MemoryEngine::new(1_000_000));
        let fallback = Arc::new(MemoryEngine::new(5_000));
        let storage = TieredStorage::new(
            Arc::new(MemoryEngineProvider::new(preferred.clone())),
            Arc::new(MemoryEngineProvider::new(fallback.clone())),
        )
        .with_namespaces(vec!["sync_queue".into(), "cached_project".into()]);
        (preferred, fallback, storage)
    }

    #[tokio::test]
    async fn test_calls_before_initialize_fail() {
        let (_, _, storage) = providers();
        assert!(matches!(
            storage.get("ns", "a").await,
            Err(StorageError::NotInitialized)
        ));
        assert!(matches!(
            storage.put("ns", &Record::new("a", json!(1))).await,
            Err(StorageError::NotInitialized)
        ));
        assert!(storage.backend_kind().is_none());
        assert_eq!(storage.name(), "uninitialized");
    }

    #[tokio::test]
    async fn test_prefers_preferred_engine() {
        let (preferred, fallback, storage) = providers();
        assert_eq!(storage.initialize().await.unwrap(), BackendKind::Preferred);

        storage.put("ns", &Record::new("a", json!(1))).await.unwrap();
        assert_eq!(preferred.get("ns", "a").await.unwrap(), Some(json!(1)));
        assert_eq!(fallback.get("ns", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_migration_copies_then_clears() {
        let (preferred, fallback, storage) = providers();
        fallback
            .put("sync_queue", &Record::new("pending", json!([{"id": "op-1"}])))
            .await
            .unwrap();
        fallback
            .put("cached_project", &Record::new("p1", json!({"name": "Site"})))
            .await
            .unwrap();
        fallback
            .put("unrelated", &Record::new("x", json!(true)))
            .await
            .unwrap();

        storage.initialize().await.unwrap();

        assert_eq!(
            preferred.get("sync_queue", "pending").await.unwrap(),
            Some(json!([{"id": "op-1"}]))
        );
        assert_eq!(preferred.get_all("cached_project").await.unwrap().len(), 1);
        assert!(fallback.get_all("sync_queue").await.unwrap().is_empty());
        // Namespaces outside the configured list stay where they are
        assert_eq!(fallback.get("unrelated", "x").await.unwrap(), Some(json!(true)));
        assert!(preferred
            .get(NS_META, MIGRATION_MARKER_ID)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_queue_left_in_fallback_after_migration_is_merged() {
        let (preferred, fallback, storage) = providers();
        preferred
            .put(NS_META, &migration_marker("memory", 0))
            .await
            .unwrap();
        preferred
            .put("sync_queue", &Record::new("pending", json!([{"id": "op-1"}, {"id": "op-2"}])))
            .await
            .unwrap();
        // Written by a session that ran on the fallback engine
        fallback
            .put("sync_queue", &Record::new("pending", json!([{"id": "op-2"}, {"id": "op-3"}])))
            .await
            .unwrap();

        storage.initialize().await.unwrap();

        assert_eq!(
            preferred.get("sync_queue", "pending").await.unwrap(),
            Some(json!([{"id": "op-1"}, {"id": "op-2"}, {"id": "op-3"}]))
        );
        assert!(fallback.get_all("sync_queue").await.unwrap().is_empty());
    }

    #[test]
    fn test_merge_value_never_overwrites() {
        assert_eq!(merge_value(None, &json!({"a": 1})), Some(json!({"a": 1})));
        assert_eq!(merge_value(Some(json!({"a": 1})), &json!({"a": 2})), None);
        assert_eq!(merge_value(Some(json!([{"id": 1}])), &json!([{"id": 1}])), None);
        assert_eq!(
            merge_value(Some(json!([1, 2])), &json!([2, 3])),
            Some(json!([1, 2, 3]))
        );
    }
}
