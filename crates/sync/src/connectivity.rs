// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network reachability tracking.
//!
//! The platform layer pushes each "became reachable" / "became unreachable"
//! notification into [`ConnectivityMonitor::set_online`]. Subscribers are woken
//! only on actual transitions; repeated reports of the same state are
//! absorbed. There is no polling and no debounce.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// Tracks whether the remote store is reachable.
///
/// Cloning yields another handle to the same state, so the platform adapter
/// and the sync service can each hold one.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor seeded with the platform's current reachability.
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        ConnectivityMonitor { tx: Arc::new(tx) }
    }

    /// Current reachability.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records a reachability report.
    ///
    /// Returns `true` if this was a transition (and subscribers were notified).
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state == online {
                return false;
            }
            *state = online;
            true
        });

        if changed {
            if online {
                info!("connectivity restored");
            } else {
                warn!("connectivity lost");
            }
        }
        changed
    }

    /// Subscribes to transitions.
    pub fn subscribe(&self) -> ConnectivityWatch {
        ConnectivityWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of a [`ConnectivityMonitor`].
#[derive(Debug, Clone)]
pub struct ConnectivityWatch {
    rx: watch::Receiver<bool>,
}

impl ConnectivityWatch {
    /// Reachability as last observed.
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next transition and returns the new state.
    ///
    /// Returns `None` once every monitor handle has been dropped. Transitions
    /// that happen faster than the subscriber wakes are coalesced into the
    /// latest state.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
