// NODE NOTIFICATIONS
// Events emitted to collaborators outside the sync and locking core
// (UI, wallet, mempool). These are not wire messages.

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use vigil_crypto::Hash256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// Sync progress fraction in [0, 1].
    SyncProgressChanged(f64),

    /// The sync machine moved to a new asset (asset name).
    SyncAssetChanged(String),

    /// A transaction lock reached its signature quorum.
    LockFinalized(Hash256),

    /// Two locks competed for an input; the loser's lock is invalidated.
    LockConflict { winner: Hash256, loser: Hash256 },
}

/// Receiver of node notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::SyncProgressChanged(p) => debug!("[Notify] sync progress {:.3}", p),
            Notification::SyncAssetChanged(name) => info!("[Notify] sync asset -> {}", name),
            Notification::LockFinalized(hash) => info!("[Notify] lock finalized {}", hash),
            Notification::LockConflict { winner, loser } => {
                warn!("[Notify] lock conflict: {} beats {}", winner, loser)
            }
        }
    }
}

/// Keeps every notification in memory. Handy for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    /// Drain recorded notifications.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn progress_values(&self) -> Vec<f64> {
        self.events
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::SyncProgressChanged(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.events.lock().push(notification);
    }
}
