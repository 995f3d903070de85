//! JSON file implementation of IStorageEngine
//!
//! The fallback engine: the whole store is one JSON document on disk.
//!
//! ## Design Notes
//!
//! - **Atomic writes**: every mutation rewrites the document to a sibling
//!   `.tmp` file and renames it over the target.
//! - **Quota**: a mutation that would grow the document past the quota is
//!   rejected with [`StorageError::QuotaExceeded`] and leaves both the file
//!   and the in-memory copy untouched.
//! - Mutations are serialized by a `tokio::sync::Mutex` held across the
//!   write, so the in-memory copy always matches the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use timegrid_core::domain::Record;
use timegrid_core::ports::{IEngineProvider, IStorageEngine, StorageError, StorageEstimate};

/// Engine name reported in logs and quota snapshots
pub const FILE_ENGINE_NAME: &str = "json_file";

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout of the fallback store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileDocument {
    version: u32,
    namespaces: BTreeMap<String, Vec<Record>>,
}

struct FileState {
    document: FileDocument,
    size_bytes: u64,
}

/// Storage engine keeping every namespace in a single JSON file
pub struct FileEngine {
    path: PathBuf,
    quota_bytes: u64,
    state: Mutex<FileState>,
}

impl FileEngine {
    /// Loads the document at `path`, or starts empty if the file does not exist
    pub async fn open(path: impl AsRef<Path>, quota_bytes: u64) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (document, size_bytes) = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let document: FileDocument = serde_json::from_slice(&bytes)?;
                if document.version != DOCUMENT_VERSION {
                    warn!(
                        path = %path.display(),
                        version = document.version,
                        "Unexpected fallback document version"
                    );
                }
                (document, bytes.len() as u64)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
                FileDocument {
                    version: DOCUMENT_VERSION,
                    namespaces: BTreeMap::new(),
                },
                0,
            ),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), bytes = size_bytes, "Fallback store opened");

        Ok(Self {
            path,
            quota_bytes,
            state: Mutex::new(FileState {
                document,
                size_bytes,
            }),
        })
    }

    /// Path of the backing JSON document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `mutate` to a copy of the document, then persists it
    ///
    /// The in-memory document is only replaced once the file write succeeded.
    async fn mutate<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut FileDocument) -> bool,
    {
        let mut state = self.state.lock().await;
        let mut next = state.document.clone();
        if !mutate(&mut next) {
            return Ok(());
        }

        let bytes = serde_json::to_vec(&next)?;
        let needed = bytes.len() as u64;
        if needed > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                needed,
                available: self.quota_bytes,
            });
        }

        self.write_atomic(&bytes).await?;
        state.document = next;
        state.size_bytes = needed;
        Ok(())
    }

    async fn write_atomic(&self, data: &[u8]) -> Result<(), StorageError> {
        let tmp_path = {
            let mut p = self.path.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };

        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IStorageEngine for FileEngine {
    fn name(&self) -> &'static str {
        FILE_ENGINE_NAME
    }

    fn is_persistent(&self) -> bool {
        true
    }

    async fn get(&self, namespace: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .document
            .namespaces
            .get(namespace)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .map(|r| r.data.clone()))
    }

    async fn get_all(&self, namespace: &str) -> Result<Vec<Record>, StorageError> {
        let state = self.state.lock().await;
        Ok(state
            .document
            .namespaces
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn put(&self, namespace: &str, record: &Record) -> Result<(), StorageError> {
        self.mutate(|doc| {
            let records = doc.namespaces.entry(namespace.to_string()).or_default();
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => existing.data = record.data.clone(),
                None => records.push(record.clone()),
            }
            true
        })
        .await
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
        self.mutate(|doc| {
            let Some(records) = doc.namespaces.get_mut(namespace) else {
                return false;
            };
            let before = records.len();
            records.retain(|r| r.id != id);
            let changed = records.len() != before;
            if records.is_empty() {
                doc.namespaces.remove(namespace);
            }
            changed
        })
        .await
    }

    async fn clear(&self, namespace: &str) -> Result<(), StorageError> {
        self.mutate(|doc| doc.namespaces.remove(namespace).is_some())
            .await
    }

    async fn estimate(&self) -> Result<StorageEstimate, StorageError> {
        let state = self.state.lock().await;
        Ok(StorageEstimate {
            used_bytes: state.size_bytes,
            capacity_bytes: self.quota_bytes,
        })
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Opens a [`FileEngine`] on a fixed path
pub struct FileEngineProvider {
    path: PathBuf,
    quota_bytes: u64,
}

impl FileEngineProvider {
    pub fn new(path: impl AsRef<Path>, quota_bytes: u64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            quota_bytes,
        }
    }
}

#[async_trait::async_trait]
impl IEngineProvider for FileEngineProvider {
    fn name(&self) -> &'static str {
        FILE_ENGINE_NAME
    }

    async fn open(&self) -> Result<Arc<dyn IStorageEngine>, StorageError> {
        Ok(Arc::new(FileEngine::open(&self.path, self.quota_bytes).await?))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    async fn setup(quota: u64) -> (TempDir, FileEngine) {
        let dir = TempDir::new().unwrap();
        let engine = FileEngine::open(dir.path().join("store.json"), quota)
            .await
            .unwrap();
        (dir, engine)
    }

    #[tokio::test]
    async fn test_put_get_survives_reopen() {
        let (dir, engine) = setup(64 * 1024).await;
        engine
            .put("sync_queue", &Record::new("pending", json!([{"id": "op-1"}])))
            .await
            .unwrap();
        engine
            .put("cached_client", &Record::new("c1", json!({"name": "Acme"})))
            .await
            .unwrap();

        let reopened = FileEngine::open(dir.path().join("store.json"), 64 * 1024)
            .await
            .unwrap();
        assert_eq!(
            reopened.get("sync_queue", "pending").await.unwrap(),
            Some(json!([{"id": "op-1"}]))
        );
        assert_eq!(reopened.get_all("cached_client").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let (dir, engine) = setup(64 * 1024).await;
        engine.put("ns", &Record::new("a", json!(1))).await.unwrap();
        assert!(dir.path().join("store.json").exists());
        assert!(!dir.path().join("store.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_upsert_keeps_position() {
        let (_dir, engine) = setup(64 * 1024).await;
        engine.put("ns", &Record::new("a", json!(1))).await.unwrap();
        engine.put("ns", &Record::new("b", json!(2))).await.unwrap();
        engine.put("ns", &Record::new("a", json!(3))).await.unwrap();

        let records = engine.get_all("ns").await.unwrap();
        assert_eq!(records[0], Record::new("a", json!(3)));
        assert_eq!(records[1], Record::new("b", json!(2)));
    }

    #[tokio::test]
    async fn test_quota_exceeded_leaves_store_untouched() {
        let (_dir, engine) = setup(200).await;
        engine
            .put("ns", &Record::new("small", json!("ok")))
            .await
            .unwrap();
        let before = engine.estimate().await.unwrap();

        let big = "x".repeat(500);
        let err = engine
            .put("ns", &Record::new("big", json!(big)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { available: 200, .. }));

        assert_eq!(engine.get("ns", "big").await.unwrap(), None);
        assert_eq!(engine.estimate().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (_dir, engine) = setup(64 * 1024).await;
        engine.put("ns", &Record::new("a", json!(1))).await.unwrap();
        engine.put("ns", &Record::new("b", json!(2))).await.unwrap();

        engine.delete("ns", "a").await.unwrap();
        engine.delete("ns", "missing").await.unwrap();
        engine.delete("unknown_ns", "a").await.unwrap();
        assert_eq!(engine.get_all("ns").await.unwrap().len(), 1);

        engine.clear("ns").await.unwrap();
        assert!(engine.get_all("ns").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_estimate_tracks_document_size() {
        let (_dir, engine) = setup(10_000).await;
        assert_eq!(engine.estimate().await.unwrap().used_bytes, 0);

        engine.put("ns", &Record::new("a", json!("hello"))).await.unwrap();
        let estimate = engine.estimate().await.unwrap();
        assert!(estimate.used_bytes > 0);
        assert_eq!(estimate.capacity_bytes, 10_000);
        assert!(!engine.request_persistence().await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_document_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = FileEngine::open(&path, 1024).await.err().unwrap();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
