//! Event sinks
//!
//! - [`BroadcastEventSink`] fans events out to any number of UI listeners
//!   over a `tokio::sync::broadcast` channel. Emitting with no listener is
//!   fine; a lagging listener loses the oldest events.
//! - [`LoggingEventSink`] writes every event to the tracing log, for
//!   headless hosts such as the CLI.

use tokio::sync::broadcast;
use tracing::{info, warn};

use timegrid_core::domain::SyncEvent;
use timegrid_core::ports::IEventSink;

const DEFAULT_CAPACITY: usize = 64;

pub struct BroadcastEventSink {
    tx: broadcast::Sender<SyncEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl IEventSink for BroadcastEventSink {
    fn emit(&self, event: SyncEvent) {
        // Err only means nobody is listening
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl IEventSink for LoggingEventSink {
    fn emit(&self, event: SyncEvent) {
        match &event {
            SyncEvent::StorageWarning { message, level } => {
                warn!(event = event.name(), %level, "{message}");
            }
            SyncEvent::SyncStatus(status) => {
                info!(
                    event = event.name(),
                    status = %status.status,
                    syncing = status.syncing,
                    queue_size = status.queue_size,
                    "Sync status"
                );
            }
            SyncEvent::DrainSummary(summary) => {
                info!(
                    event = event.name(),
                    synced = summary.synced_count,
                    failed = summary.failed_count,
                    dropped = summary.dropped_count,
                    remaining = summary.remaining_queue_size,
                    "Drain finished"
                );
            }
            SyncEvent::SyncComplete {
                synced_count,
                failed_count,
            } => {
                info!(event = event.name(), synced_count, failed_count, "Sync complete");
            }
        }
    }
}
