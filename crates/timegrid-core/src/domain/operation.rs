//! QueuedOperation domain entity
//!
//! A queued operation is a write that could not (or should not) be applied
//! to the remote API immediately. Operations are kept in FIFO order and
//! replayed by the sync orchestrator.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  dispatch   ┌──────────┐  success   ┌───────────┐
//!   │ Pending │ ──────────► │ InFlight │ ─────────► │ Committed │
//!   └─────────┘             └──────────┘            └───────────┘
//!        ▲                       │  │
//!        │ failure, retries left │  │ failure, cap reached
//!        └───────────────────────┘  ▼
//!                              ┌─────────┐
//!                              │ Dropped │
//!                              └─────────┘
//! ```
//!
//! `Committed` and `Dropped` are terminal and both remove the operation
//! from the queue.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::{EntityType, OperationId};
use super::record::entity_id;

/// Number of retries an operation gets after its first failed attempt
pub const MAX_RETRIES: u32 = 3;

// ============================================================================
// OperationKind
// ============================================================================

/// The kind of write carried by a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// Returns true if the operation targets an existing remote entity
    pub fn requires_remote_id(&self) -> bool {
        matches!(self, OperationKind::Update | OperationKind::Delete)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

impl FromStr for OperationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown operation kind '{other}'"
            ))),
        }
    }
}

// ============================================================================
// OperationState
// ============================================================================

/// Lifecycle state of an operation during a drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Pending,
    InFlight,
    Committed,
    Dropped,
}

impl OperationState {
    /// Returns true for states that remove the operation from the queue
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Committed | OperationState::Dropped)
    }

    /// Checks whether `self -> target` is a legal transition
    pub fn can_transition_to(&self, target: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, target),
            (Pending, InFlight) | (InFlight, Committed) | (InFlight, Pending) | (InFlight, Dropped)
        )
    }

    /// Validates and performs a transition
    pub fn transition_to(self, target: OperationState) -> Result<OperationState, DomainError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DomainError::InvalidState {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationState::Pending => "pending",
            OperationState::InFlight => "in_flight",
            OperationState::Committed => "committed",
            OperationState::Dropped => "dropped",
        };
        f.write_str(s)
    }
}

// ============================================================================
// QueuedOperation
// ============================================================================

/// A pending write waiting to be applied to the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    id: OperationId,
    kind: OperationKind,
    entity_type: EntityType,
    payload: Value,
    enqueued_at: DateTime<Utc>,
    #[serde(default)]
    retry_count: u32,
}

impl QueuedOperation {
    /// Creates a new operation with a fresh id and a zero retry count
    pub fn new(
        kind: OperationKind,
        entity_type: EntityType,
        payload: Value,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            entity_type,
            payload,
            enqueued_at,
            retry_count: 0,
        }
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Remote id of the targeted entity, read from the payload's `id` field
    pub fn remote_id(&self) -> Option<String> {
        entity_id(&self.payload)
    }

    /// Like [`remote_id`](Self::remote_id) but an error when absent
    pub fn require_remote_id(&self) -> Result<String, DomainError> {
        self.remote_id()
            .ok_or_else(|| DomainError::MissingRemoteId(self.id.to_string()))
    }

    /// Returns true if another attempt is allowed after a failure
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries
    }

    /// Records a failed attempt
    pub fn record_failure(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
    }
}
