//! In-process implementation of IStorageEngine
//!
//! Used by tests throughout the workspace and by hosts without a data
//! directory. Failure injection hooks let tests make reads, writes, or
//! `open()` fail on demand.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use timegrid_core::domain::Record;
use timegrid_core::ports::{IEngineProvider, IStorageEngine, StorageError, StorageEstimate};

/// Engine name reported in logs and quota snapshots
pub const MEMORY_ENGINE_NAME: &str = "memory";

/// Sentinel for "no usage override set"
const NO_OVERRIDE: u64 = u64::MAX;

/// Volatile storage engine backed by a map of namespaces
pub struct MemoryEngine {
    namespaces: RwLock<BTreeMap<String, Vec<Record>>>,
    capacity_bytes: u64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    grant_persistence: AtomicBool,
    used_override: AtomicU64,
    writes: AtomicUsize,
}

impl MemoryEngine {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            namespaces: RwLock::new(BTreeMap::new()),
            capacity_bytes,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            grant_persistence: AtomicBool::new(false),
            used_override: AtomicU64::new(NO_OVERRIDE),
            writes: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent read fail with `StorageError::Io`
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail with `StorageError::Io`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Controls the answer to `request_persistence()`
    pub fn set_grant_persistence(&self, grant: bool) {
        self.grant_persistence.store(grant, Ordering::SeqCst);
    }

    /// Reports `used_bytes` from `estimate()` instead of the measured size
    pub fn set_reported_usage(&self, used_bytes: Option<u64>) {
        self.used_override
            .store(used_bytes.unwrap_or(NO_OVERRIDE), Ordering::SeqCst);
    }

    /// Number of successful `put`/`delete`/`clear` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Io("injected read failure".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("injected write failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

#[async_trait::async_trait]
impl IStorageEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        MEMORY_ENGINE_NAME
    }

    fn is_persistent(&self) -> bool {
        false
    }

    async fn get(&self, namespace: &str, id: &str) -> Result<Option<Value>, StorageError> {
        self.check_read()?;
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .map(|r| r.data.clone()))
    }

    async fn get_all(&self, namespace: &str) -> Result<Vec<Record>, StorageError> {
        self.check_read()?;
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).cloned().unwrap_or_default())
    }

    async fn put(&self, namespace: &str, record: &Record) -> Result<(), StorageError> {
        self.check_write()?;
        let mut namespaces = self.namespaces.write().await;
        let records = namespaces.entry(namespace.to_string()).or_default();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => existing.data = record.data.clone(),
            None => records.push(record.clone()),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
        self.check_write()?;
        let mut namespaces = self.namespaces.write().await;
        if let Some(records) = namespaces.get_mut(namespace) {
            records.retain(|r| r.id != id);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> Result<(), StorageError> {
        self.check_write()?;
        self.namespaces.write().await.remove(namespace);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn estimate(&self) -> Result<StorageEstimate, StorageError> {
        let used_bytes = match self.used_override.load(Ordering::SeqCst) {
            NO_OVERRIDE => {
                let namespaces = self.namespaces.read().await;
                namespaces
                    .iter()
                    .map(|(ns, records)| {
                        ns.len() as u64 + records.iter().map(Record::approximate_size).sum::<u64>()
                    })
                    .sum()
            }
            used => used,
        };
        Ok(StorageEstimate {
            used_bytes,
            capacity_bytes: self.capacity_bytes,
        })
    }

    async fn request_persistence(&self) -> Result<bool, StorageError> {
        Ok(self.grant_persistence.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Hands out a shared [`MemoryEngine`], or fails to open on purpose
pub struct MemoryEngineProvider {
    engine: Option<Arc<MemoryEngine>>,
    opens: AtomicUsize,
}

impl MemoryEngineProvider {
    /// Provider whose `open()` always returns `engine`
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        Self {
            engine: Some(engine),
            opens: AtomicUsize::new(0),
        }
    }

    /// Provider whose `open()` always fails with `StorageError::Unavailable`
    pub fn unavailable() -> Self {
        Self {
            engine: None,
            opens: AtomicUsize::new(0),
        }
    }

    /// Number of `open()` calls so far, successful or not
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IEngineProvider for MemoryEngineProvider {
    fn name(&self) -> &'static str {
        MEMORY_ENGINE_NAME
    }

    async fn open(&self) -> Result<Arc<dyn IStorageEngine>, StorageError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match &self.engine {
            Some(engine) => Ok(engine.clone() as Arc<dyn IStorageEngine>),
            None => Err(StorageError::Unavailable(
                "memory engine disabled for this provider".into(),
            )),
        }
    }
}
