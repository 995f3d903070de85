//! Storage engine port (driven/secondary port)
//!
//! This module defines the interface every concrete storage medium
//! implements: a namespaced key-value space of JSON [`Record`]s.
//!
//! ## Design Notes
//!
//! - Unlike the other ports, storage failures are classified
//!   ([`StorageError`]) because callers react differently to "quota exceeded"
//!   than to "engine unavailable".
//! - Every `put`/`delete`/`clear` must be atomic for the key(s) it touches;
//!   there are no multi-key transactions.
//! - Engines are opened through an [`IEngineProvider`] so the tiered backend
//!   can probe the preferred medium and fall back if opening fails.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::domain::Record;

/// Errors surfaced by storage engines
#[derive(Debug, Error)]
pub enum StorageError {
    /// An operation was attempted before `initialize()` resolved an engine
    #[error("Storage not initialized")]
    NotInitialized,

    /// The engine cannot be used (failed to open, closed, missing)
    #[error("Storage engine unavailable: {0}")]
    Unavailable(String),

    /// The write would exceed the engine's quota
    #[error("Storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded {
        /// Bytes the store would occupy after the write
        needed: u64,
        /// Capacity of the engine
        available: u64,
    },

    /// Low-level I/O failure
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// A stored document could not be encoded or decoded
    #[error("Storage serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Usage and capacity as reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub used_bytes: u64,
    pub capacity_bytes: u64,
}

/// Port trait for a concrete storage medium
#[async_trait::async_trait]
pub trait IStorageEngine: Send + Sync {
    /// Short engine name used in logs and quota snapshots
    fn name(&self) -> &'static str;

    /// Whether data survives a process restart
    fn is_persistent(&self) -> bool;

    /// Reads one record's document
    async fn get(&self, namespace: &str, id: &str) -> Result<Option<Value>, StorageError>;

    /// Reads all records of a namespace, in insertion order
    async fn get_all(&self, namespace: &str) -> Result<Vec<Record>, StorageError>;

    /// Inserts or replaces a record
    async fn put(&self, namespace: &str, record: &Record) -> Result<(), StorageError>;

    /// Deletes a record; deleting a missing record is not an error
    async fn delete(&self, namespace: &str, id: &str) -> Result<(), StorageError>;

    /// Deletes every record of a namespace
    async fn clear(&self, namespace: &str) -> Result<(), StorageError>;

    /// Reports current usage and capacity
    async fn estimate(&self) -> Result<StorageEstimate, StorageError>;

    /// Asks the host to keep this data durable
    ///
    /// Returns whether durability was granted. Engines without such a
    /// notion return `Ok(false)`.
    async fn request_persistence(&self) -> Result<bool, StorageError> {
        Ok(false)
    }
}

/// Opens a storage engine on demand
#[async_trait::async_trait]
pub trait IEngineProvider: Send + Sync {
    /// Name of the engine this provider opens
    fn name(&self) -> &'static str;

    /// Opens (probes) the engine
    async fn open(&self) -> Result<Arc<dyn IStorageEngine>, StorageError>;
}
