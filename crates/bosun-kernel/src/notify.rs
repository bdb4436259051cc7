//! Outbound status notifications for passive observers.
//!
//! The broadcast is a secondary channel: every supervisor operation reports
//! its authoritative outcome through its own return value, and observers
//! such as the tray resync loop additionally receive these events. Sends
//! never block and disconnected observers are pruned on the next publish.

use std::sync::mpsc::{Receiver, Sender, channel};

use bosun_config::ProxyMode;
use strum::Display;

/// Stages reported while fetching a release artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DownloadStage {
    /// Consulting the release feed.
    Checking,
    /// A newer release was found.
    Found,
    /// Fetching the artefact.
    Downloading,
    /// Unpacking the artefact.
    Extracting,
    /// The artefact is ready.
    Completed,
}

/// Notifications broadcast to passive observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The kernel's running flag actually flipped.
    RunningChanged {
        /// New value of the flag.
        running: bool,
    },
    /// The proxy mode changed.
    ModeChanged {
        /// Newly applied mode.
        mode: ProxyMode,
    },
    /// Derived menus should be regenerated for a reason other than a fact
    /// change (e.g. the active profile was renamed).
    MenuRefreshRequested,
    /// A newer release is available.
    UpdateAvailable {
        /// Version advertised by the release feed.
        latest_version: String,
        /// Artefact download location.
        download_url: String,
    },
    /// Progress while fetching a release artefact.
    DownloadProgress {
        /// Current stage.
        stage: DownloadStage,
        /// Completion percentage, 0–100.
        percent: u8,
        /// Human-readable progress line.
        message: String,
    },
    /// Outcome of one latency probe in a sweep.
    LatencyReport {
        /// Proxy that was probed.
        proxy: String,
        /// Round-trip in milliseconds; `None` when the probe failed.
        delay_ms: Option<u64>,
    },
}

/// Fan-out of [`StatusEvent`]s to any number of observers.
#[derive(Debug, Default)]
pub struct Broadcast {
    observers: Vec<Sender<StatusEvent>>,
}

impl Broadcast {
    /// Builds an empty broadcast.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new observer and returns its receiving end.
    pub fn subscribe(&mut self) -> Receiver<StatusEvent> {
        let (sender, receiver) = channel();
        self.observers.push(sender);
        receiver
    }

    /// Publishes an event to every live observer, pruning dead ones.
    pub fn publish(&mut self, event: &StatusEvent) {
        self.observers
            .retain(|observer| observer.send(event.clone()).is_ok());
    }

    /// Number of currently registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_every_observer() {
        let mut broadcast = Broadcast::new();
        let first = broadcast.subscribe();
        let second = broadcast.subscribe();
        broadcast.publish(&StatusEvent::MenuRefreshRequested);

        assert_eq!(first.try_recv().ok(), Some(StatusEvent::MenuRefreshRequested));
        assert_eq!(second.try_recv().ok(), Some(StatusEvent::MenuRefreshRequested));
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let mut broadcast = Broadcast::new();
        drop(broadcast.subscribe());
        broadcast.publish(&StatusEvent::MenuRefreshRequested);

        assert_eq!(broadcast.observer_count(), 0);
    }
}
