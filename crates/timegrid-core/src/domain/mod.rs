//! Domain entities and business logic
//!
//! This module contains the core domain types of the offline core:
//! - Newtypes for identifiers and storage namespaces
//! - Queued operations and their state machine
//! - Storage records and shadow records
//! - Session types (plaintext and encrypted)
//! - Quota snapshots
//! - Events reported to the UI layer
//! - Domain-specific error types

pub mod errors;
pub mod events;
pub mod newtypes;
pub mod operation;
pub mod quota;
pub mod record;
pub mod session;

// Re-export commonly used types
pub use errors::DomainError;
pub use events::{ConnectivityStatus, DrainSummary, SyncEvent, SyncStatusEvent, WarningLevel};
pub use newtypes::*;
pub use operation::{OperationKind, OperationState, QueuedOperation, MAX_RETRIES};
pub use quota::{BackendKind, QuotaSnapshot};
pub use record::{entity_id, Record, ShadowRecord};
pub use session::{AuthSession, EncryptedSessionBlob, SessionUser, SESSION_BLOB_VERSION};
