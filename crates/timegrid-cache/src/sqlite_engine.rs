//! SQLite implementation of IStorageEngine
//!
//! The preferred engine. All namespaces share one table,
//! `kv_records(namespace, id, data, seq, updated_at)`.
//!
//! ## Type Mapping
//!
//! | Field         | SQL Type | Strategy                                   |
//! |---------------|----------|--------------------------------------------|
//! | namespace, id | TEXT     | Stored as-is                               |
//! | data          | TEXT     | `serde_json` document                      |
//! | seq           | INTEGER  | First-insert position, kept across upserts |
//! | updated_at    | TEXT     | ISO 8601 via `to_rfc3339()`                |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use timegrid_core::domain::Record;
use timegrid_core::ports::{IEngineProvider, IStorageEngine, StorageError, StorageEstimate};

use crate::DatabasePool;

/// Engine name reported in logs and quota snapshots
pub const SQLITE_ENGINE_NAME: &str = "sqlite";

/// SQLite-backed storage engine
pub struct SqliteEngine {
    pool: SqlitePool,
    capacity_bytes: u64,
    file_backed: bool,
}

impl SqliteEngine {
    /// Wraps an initialized [`DatabasePool`]
    ///
    /// `capacity_bytes` is the capacity reported by [`IStorageEngine::estimate`].
    pub fn new(pool: &DatabasePool, capacity_bytes: u64) -> Self {
        Self {
            pool: pool.pool().clone(),
            capacity_bytes,
            file_backed: pool.path().is_some(),
        }
    }
}

fn sql_err(e: sqlx::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

#[async_trait::async_trait]
impl IStorageEngine for SqliteEngine {
    fn name(&self) -> &'static str {
        SQLITE_ENGINE_NAME
    }

    fn is_persistent(&self) -> bool {
        self.file_backed
    }

    async fn get(&self, namespace: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let data: Option<String> =
            sqlx::query_scalar("SELECT data FROM kv_records WHERE namespace = ? AND id = ?")
                .bind(namespace)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(sql_err)?;

        match data {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self, namespace: &str) -> Result<Vec<Record>, StorageError> {
        let rows = sqlx::query("SELECT id, data FROM kv_records WHERE namespace = ? ORDER BY seq ASC")
            .bind(namespace)
            .fetch_all(&self.pool)
            .await
            .map_err(sql_err)?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let text: String = row.get("data");
                Ok(Record::new(id, serde_json::from_str(&text)?))
            })
            .collect()
    }

    async fn put(&self, namespace: &str, record: &Record) -> Result<(), StorageError> {
        let data = serde_json::to_string(&record.data)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO kv_records (namespace, id, data, seq, updated_at) \
             VALUES (?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM kv_records), ?) \
             ON CONFLICT(namespace, id) DO UPDATE SET \
             data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(namespace)
        .bind(&record.id)
        .bind(&data)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(sql_err)?;

        tracing::trace!(namespace, id = %record.id, bytes = data.len(), "Saved record");
        Ok(())
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_records WHERE namespace = ? AND id = ?")
            .bind(namespace)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sql_err)?;
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM kv_records WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await
            .map_err(sql_err)?;

        tracing::debug!(namespace, removed = result.rows_affected(), "Cleared namespace");
        Ok(())
    }

    async fn estimate(&self) -> Result<StorageEstimate, StorageError> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(sql_err)?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(sql_err)?;

        Ok(StorageEstimate {
            used_bytes: (page_count.max(0) as u64) * (page_size.max(0) as u64),
            capacity_bytes: self.capacity_bytes,
        })
    }

    async fn request_persistence(&self) -> Result<bool, StorageError> {
        Ok(self.file_backed)
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Opens a [`SqliteEngine`], either on a database file or in memory
pub struct SqliteEngineProvider {
    path: Option<PathBuf>,
    capacity_bytes: u64,
}

impl SqliteEngineProvider {
    /// Provider for the database file at `path`
    pub fn file(path: impl AsRef<Path>, capacity_bytes: u64) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            capacity_bytes,
        }
    }

    /// Provider for a fresh in-memory database
    pub fn in_memory(capacity_bytes: u64) -> Self {
        Self {
            path: None,
            capacity_bytes,
        }
    }
}

#[async_trait::async_trait]
impl IEngineProvider for SqliteEngineProvider {
    fn name(&self) -> &'static str {
        SQLITE_ENGINE_NAME
    }

    async fn open(&self) -> Result<Arc<dyn IStorageEngine>, StorageError> {
        let pool = match &self.path {
            Some(path) => DatabasePool::new(path).await?,
            None => DatabasePool::in_memory().await?,
        };
        Ok(Arc::new(SqliteEngine::new(&pool, self.capacity_bytes)))
    }
}
