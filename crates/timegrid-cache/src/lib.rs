//! TimeGrid Cache - Tiered local storage
//!
//! Storage engines for the offline core:
//! - SQLite database (preferred, high capacity, durable)
//! - Single JSON document file (fallback, small fixed quota)
//! - In-process memory (tests and data-dir-less hosts)
//!
//! ## Architecture
//!
//! Every engine implements the `IStorageEngine` port from `timegrid-core`.
//! [`TieredStorage`] resolves one engine at `initialize()` time, migrates
//! legacy fallback data into the preferred engine, and then forwards every
//! call to the resolved engine, checking its usage against a
//! [`QuotaMonitor`] after every write.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - SQLite connection pool with migration support
//! - [`SqliteEngine`] / [`SqliteEngineProvider`] - Preferred engine
//! - [`FileEngine`] / [`FileEngineProvider`] - Fallback engine
//! - [`MemoryEngine`] / [`MemoryEngineProvider`] - In-process engine
//! - [`TieredStorage`] - Engine selection, migration and forwarding
//! - [`QuotaMonitor`] - Threshold policy for one-shot storage warnings
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use timegrid_cache::{FileEngineProvider, SqliteEngineProvider, TieredStorage};
//!
//! # async fn example() -> Result<(), timegrid_core::ports::StorageError> {
//! let storage = TieredStorage::new(
//!     Arc::new(SqliteEngineProvider::file("/tmp/timegrid/timegrid.db", 512 * 1024 * 1024)),
//!     Arc::new(FileEngineProvider::new("/tmp/timegrid/fallback-store.json", 5 * 1024 * 1024)),
//! );
//! storage.initialize().await?;
//! # Ok(())
//! # }
//! ```

pub mod file_engine;
pub mod memory_engine;
pub mod pool;
pub mod quota;
pub mod sqlite_engine;
pub mod tiered;

pub use file_engine::{FileEngine, FileEngineProvider};
pub use memory_engine::{MemoryEngine, MemoryEngineProvider};
pub use pool::DatabasePool;
pub use quota::QuotaMonitor;
pub use sqlite_engine::{SqliteEngine, SqliteEngineProvider};
pub use tiered::TieredStorage;

use timegrid_core::ports::StorageError;

/// Errors that can occur while setting up the SQLite database
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

impl From<CacheError> for StorageError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::QueryFailed(msg) => StorageError::Io(msg),
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}
