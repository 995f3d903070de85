//! Storage quota monitoring
//!
//! [`QuotaMonitor`] holds the warning policy: a threshold and the sink that
//! receives `StorageWarning` events. [`TieredStorage`](crate::TieredStorage)
//! owns the latch, which lives in its resolved state, and consults the
//! monitor once on `initialize()` and after every successful write. The
//! warning therefore fires once when usage crosses the threshold and not
//! again until a new backend is initialized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use timegrid_core::domain::{QuotaSnapshot, SyncEvent, WarningLevel};
use timegrid_core::ports::IEventSink;

/// Usage at or above this percentage is reported as critical
const CRITICAL_PERCENT: u8 = 95;

/// Threshold policy for storage warnings
pub struct QuotaMonitor {
    events: Arc<dyn IEventSink>,
    threshold_percent: u8,
}

impl QuotaMonitor {
    pub fn new(events: Arc<dyn IEventSink>, threshold_percent: u8) -> Self {
        Self {
            events,
            threshold_percent: threshold_percent.clamp(1, 100),
        }
    }

    /// Emits a `StorageWarning` if `snapshot` is over the threshold and
    /// `latch` was not yet set
    ///
    /// Returns `true` only for the call that emitted the warning.
    pub(crate) fn evaluate(&self, snapshot: &QuotaSnapshot, latch: &AtomicBool) -> bool {
        let percent = snapshot.usage_percent();
        debug!(
            used = snapshot.used_bytes,
            capacity = snapshot.capacity_bytes,
            percent,
            "Storage usage checked"
        );

        if percent < self.threshold_percent || latch.swap(true, Ordering::SeqCst) {
            return false;
        }

        let level = if percent >= CRITICAL_PERCENT {
            WarningLevel::Critical
        } else {
            WarningLevel::Warning
        };
        let message = format!(
            "Local storage is {}% full ({} of {} used on {})",
            percent,
            format_bytes(snapshot.used_bytes),
            format_bytes(snapshot.capacity_bytes),
            snapshot.engine,
        );
        warn!(%message, %level, "Storage usage above threshold");
        self.events.emit(SyncEvent::StorageWarning { message, level });
        true
    }
}

/// Formats a byte count with a binary unit, e.g. `4.3 MiB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
