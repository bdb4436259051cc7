//! Telemetry subscription hub: stream lifecycle and snapshot ownership.
//!
//! The hub is the only writer of [`TelemetrySnapshot`]: pushed events are
//! funnelled through one pump thread, and every external read is a copy-out
//! clone. Open and close are idempotent; at most one subscription exists
//! per category at any time, enforced here rather than by caller
//! discipline.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::events::{EventCategory, EventSubscription, EventTransport, RawEvent};
use crate::telemetry::TelemetrySnapshot;

const HUB_TARGET: &str = "bosun_kernel::subscriptions";

/// Interval between uptime ticks.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Owns the push-event subscriptions and the telemetry they feed.
pub struct TelemetryHub {
    transport: Box<dyn EventTransport>,
    snapshot: Arc<Mutex<TelemetrySnapshot>>,
    uptime_seconds: Arc<AtomicU64>,
    accepting: Arc<AtomicBool>,
    ticker_stop: Arc<AtomicBool>,
    handles: Vec<Box<dyn EventSubscription>>,
}

impl TelemetryHub {
    /// Builds a hub over the supplied transport; no streams are opened yet.
    #[must_use]
    pub fn new(transport: Box<dyn EventTransport>) -> Self {
        Self {
            transport,
            snapshot: Arc::new(Mutex::new(TelemetrySnapshot::default())),
            uptime_seconds: Arc::new(AtomicU64::new(0)),
            accepting: Arc::new(AtomicBool::new(false)),
            ticker_stop: Arc::new(AtomicBool::new(true)),
            handles: Vec::new(),
        }
    }

    /// Opens one subscription per category and starts the uptime ticker.
    ///
    /// Calling `open` while subscriptions are active closes them first, so
    /// the single-subscription-per-category invariant holds structurally.
    /// A category whose stream cannot be opened is logged and skipped; the
    /// remaining streams still deliver.
    pub fn open(&mut self) {
        if self.is_open() {
            self.close();
        }

        // Each generation gets its own flag: a pump still draining a closed
        // generation must never see a later open and resume applying.
        self.accepting = Arc::new(AtomicBool::new(true));
        self.uptime_seconds.store(0, Ordering::SeqCst);

        let (sink, source) = channel();
        for category in EventCategory::ALL {
            match self.transport.subscribe(category, sink.clone()) {
                Ok(handle) => {
                    debug!(target: HUB_TARGET, %category, "subscription opened");
                    self.handles.push(handle);
                }
                Err(error) => {
                    warn!(
                        target: HUB_TARGET,
                        %category,
                        error = %error,
                        "failed to open subscription; category will be silent"
                    );
                }
            }
        }
        drop(sink);

        self.spawn_pump(source);
        self.spawn_ticker();
    }

    /// Closes every subscription and stops the uptime ticker.
    ///
    /// Safe to call repeatedly and concurrently with in-flight delivery:
    /// events arriving after close are discarded, not processed.
    pub fn close(&mut self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.ticker_stop.store(true, Ordering::SeqCst);
        for mut handle in self.handles.drain(..) {
            debug!(target: HUB_TARGET, category = %handle.category(), "subscription closed");
            handle.close();
        }
    }

    /// Whether subscriptions are currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Zeroes the telemetry snapshot and the uptime counter.
    pub fn reset(&mut self) {
        lock_snapshot(&self.snapshot).reset();
        self.uptime_seconds.store(0, Ordering::SeqCst);
    }

    /// Copy-out read of the current telemetry.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        lock_snapshot(&self.snapshot).clone()
    }

    /// Seconds the streams have been open, ticking independently of event
    /// arrival.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.uptime_seconds.load(Ordering::SeqCst)
    }

    fn spawn_pump(&self, source: Receiver<RawEvent>) {
        let snapshot = Arc::clone(&self.snapshot);
        let accepting = Arc::clone(&self.accepting);
        thread::spawn(move || {
            for event in source.iter() {
                if !accepting.load(Ordering::SeqCst) {
                    // Arrived after close; discard rather than process.
                    continue;
                }
                lock_snapshot(&snapshot).apply(&event);
            }
            debug!(target: HUB_TARGET, "event pump drained");
        });
    }

    fn spawn_ticker(&mut self) {
        let stop = Arc::new(AtomicBool::new(false));
        self.ticker_stop = Arc::clone(&stop);
        let uptime = Arc::clone(&self.uptime_seconds);
        thread::spawn(move || {
            loop {
                thread::sleep(TICK_INTERVAL);
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                uptime.fetch_add(1, Ordering::SeqCst);
            }
        });
    }
}

impl Drop for TelemetryHub {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TelemetryHub {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TelemetryHub")
            .field("open", &self.is_open())
            .field("subscriptions", &self.handles.len())
            .finish()
    }
}

/// Locks the snapshot, recovering from poisoning so telemetry survives a
/// panicking reader.
fn lock_snapshot(
    snapshot: &Arc<Mutex<TelemetrySnapshot>>,
) -> std::sync::MutexGuard<'_, TelemetrySnapshot> {
    snapshot
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}
