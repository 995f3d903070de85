//! Event sink port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Events are fire-and-forget; emitting never fails and never blocks on
//!   the subscriber.
//! - Implementations must tolerate having no subscriber at all.

use crate::domain::SyncEvent;

/// Port trait for delivering [`SyncEvent`]s to UI-level collaborators
pub trait IEventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl IEventSink for NullEventSink {
    fn emit(&self, _event: SyncEvent) {}
}
