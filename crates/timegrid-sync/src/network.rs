//! Connectivity source backed by a `tokio::sync::watch` channel
//!
//! The host (a platform connectivity probe, a UI toggle, a test) calls
//! [`NetworkMonitor::set_online`]; subscribers only see real transitions.

use tokio::sync::watch;
use tracing::info;

use timegrid_core::ports::INetworkStatus;

/// Current connectivity plus a stream of online/offline transitions
pub struct NetworkMonitor {
    state: watch::Sender<bool>,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self { state }
    }

    /// Records the current connectivity; returns `true` on a transition
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl INetworkStatus for NetworkMonitor {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
