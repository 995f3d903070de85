//! Events emitted to UI-level collaborators
//!
//! The offline core never renders anything itself. It reports storage
//! warnings and sync progress as [`SyncEvent`]s through the
//! [`IEventSink`](crate::ports::IEventSink) port; toasts, banners and cache
//! invalidation are the subscriber's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a storage warning
///
/// Maps to the toast/banner style chosen by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Info,
    #[default]
    Warning,
    Critical,
}

impl std::fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WarningLevel::Info => "info",
            WarningLevel::Warning => "warning",
            WarningLevel::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Network reachability as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Online,
    Offline,
}

impl ConnectivityStatus {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityStatus::Online
        } else {
            ConnectivityStatus::Offline
        }
    }
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConnectivityStatus::Online => "online",
            ConnectivityStatus::Offline => "offline",
        })
    }
}

/// Connectivity/sync state snapshot for status indicators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusEvent {
    pub status: ConnectivityStatus,
    pub syncing: bool,
    pub queue_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Aggregated result of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainSummary {
    /// Operations committed to the remote API
    pub synced_count: usize,
    /// Operations whose attempt failed (kept for retry or dropped)
    pub failed_count: usize,
    /// Failed operations removed for good in this pass
    pub dropped_count: usize,
    /// Queue length after the pass
    pub remaining_queue_size: usize,
}

/// Everything the offline core reports to the outside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// Storage usage crossed the warning threshold
    StorageWarning { message: String, level: WarningLevel },
    /// Connectivity or queue state changed
    SyncStatus(SyncStatusEvent),
    /// Per-pass feedback (toast/banner)
    DrainSummary(DrainSummary),
    /// A drain pass finished; dependent caches should be invalidated
    #[serde(rename_all = "camelCase")]
    SyncComplete {
        synced_count: usize,
        failed_count: usize,
    },
}

impl SyncEvent {
    /// Short event name, matching the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::StorageWarning { .. } => "storage-warning",
            SyncEvent::SyncStatus(_) => "sync-status",
            SyncEvent::DrainSummary(_) => "drain-summary",
            SyncEvent::SyncComplete { .. } => "sync-complete",
        }
    }
}
