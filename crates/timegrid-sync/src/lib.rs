//! TimeGrid Sync - Offline mutation queue and sync orchestration
//!
//! Provides:
//! - A persisted FIFO queue of pending writes
//! - Optimistic shadow records for entities created offline
//! - A typed handler registry in place of string dispatch
//! - The drain loop that replays queued writes against the remote API
//!
//! ## Modules
//!
//! - [`queue`] - `MutationQueue`, memory and storage kept in lockstep
//! - [`shadow`] - `ShadowStore` for `offline_<entity>` records
//! - [`cache`] - `EntityCache` mirror and the merged `OfflineReader` view
//! - [`handlers`] - `HandlerRegistry` over an `IEntityClient`
//! - [`orchestrator`] - `SyncOrchestrator` (submit, drain, run, status)
//! - [`network`] - `NetworkMonitor`, a watch-channel connectivity source
//! - [`events`] - Event sinks for UI-level collaborators

pub mod cache;
pub mod events;
pub mod handlers;
pub mod network;
pub mod orchestrator;
pub mod queue;
pub mod shadow;

pub use cache::{EntityCache, OfflineReader};
pub use events::{BroadcastEventSink, LoggingEventSink};
pub use handlers::HandlerRegistry;
pub use network::NetworkMonitor;
pub use orchestrator::{DrainOutcome, OrchestratorSettings, SyncOrchestrator};
pub use queue::MutationQueue;
pub use shadow::ShadowStore;

use thiserror::Error;

use timegrid_core::domain::{DomainError, OperationId};
use timegrid_core::ports::StorageError;

/// Errors that can occur in the queue and orchestrator
#[derive(Debug, Error)]
pub enum SyncError {
    /// The storage backend failed; the action did not take effect
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The operation was rejected before it was queued
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A persisted document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persisted queue is not a list of operations
    #[error("Corrupt queue record: {0}")]
    CorruptQueue(String),

    /// No queued operation has this id
    #[error("Operation not found: {0}")]
    OperationNotFound(OperationId),
}
