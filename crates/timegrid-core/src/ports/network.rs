//! Network status port
//!
//! Business logic never reads a host "online" flag directly. The current
//! state and its transitions come through [`INetworkStatus`], so tests can
//! flip connectivity deterministically.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Source of connectivity state and online/offline transitions
pub trait INetworkStatus: Send + Sync {
    /// Current connectivity
    fn is_online(&self) -> bool;

    /// Subscribes to transitions; the channel value is `true` while online
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Source of wall-clock time
pub trait IClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`IClock`] backed by the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl IClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
