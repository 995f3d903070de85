//! Remote API ports (driven/secondary ports)
//!
//! Two layers:
//!
//! - [`IEntityClient`] is the external collaborator: one REST client
//!   exposing `create`/`update`/`delete` for entity collections.
//! - [`IOperationHandler`] is what the sync orchestrator dispatches to. A
//!   handler is registered once per `(entity type, operation kind)` pair.

use serde_json::Value;
use thiserror::Error;

use crate::domain::{EntityType, OperationId, QueuedOperation};

/// Errors returned by remote operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection refused, DNS failure, reset, ...
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the transport timeout
    #[error("Request timed out")]
    Timeout,

    /// 5xx response
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// 429 response
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 401/403 response
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other 4xx response; the server will not accept this write
    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The queued operation itself is malformed (e.g. no remote id)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl RemoteError {
    /// Returns true if retrying the same request may succeed
    ///
    /// Network failures, timeouts, rate limiting, server errors and expired
    /// credentials (refreshed by the caller between drains) are transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Network(_)
                | RemoteError::Timeout
                | RemoteError::Server { .. }
                | RemoteError::RateLimited(_)
                | RemoteError::Unauthorized(_)
                | RemoteError::InvalidResponse(_)
        )
    }
}

/// Successful result of applying an operation remotely
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The entity was created; carries the server representation
    Created(Value),
    Updated,
    Deleted,
}

/// REST client for one family of entity collections
#[async_trait::async_trait]
pub trait IEntityClient: Send + Sync {
    /// Creates an entity and returns the server's representation
    ///
    /// `idempotency_key` is the queue id of the operation; it is stable
    /// across retries of the same operation.
    async fn create(
        &self,
        entity: &EntityType,
        payload: &Value,
        idempotency_key: &OperationId,
    ) -> Result<Value, RemoteError>;

    /// Applies a partial update to an existing entity
    async fn update(&self, entity: &EntityType, id: &str, partial: &Value)
        -> Result<(), RemoteError>;

    /// Deletes an existing entity
    async fn delete(&self, entity: &EntityType, id: &str) -> Result<(), RemoteError>;
}

/// Typed command handler the orchestrator dispatches a queued operation to
#[async_trait::async_trait]
pub trait IOperationHandler: Send + Sync {
    async fn apply(&self, op: &QueuedOperation) -> Result<ApplyOutcome, RemoteError>;
}
