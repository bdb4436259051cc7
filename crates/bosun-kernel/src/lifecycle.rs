//! Kernel lifecycle control: start with readiness retry, guaranteed-cleanup
//! stop, and strict stop-then-start restart.

use tracing::{debug, info, warn};

use crate::control::{KernelControl, KernelIdentity};
use crate::errors::LifecycleError;
use crate::events::EventTransport;
use crate::notify::{Broadcast, StatusEvent};
use crate::state::WorkerState;
use crate::subscriptions::TelemetryHub;
use crate::telemetry::TelemetrySnapshot;

const LIFECYCLE_TARGET: &str = "bosun_kernel::lifecycle";

/// Number of identity probes attempted after a start command is accepted.
pub const READINESS_ATTEMPTS: u32 = 5;

/// Delay between consecutive readiness probes.
pub const READINESS_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

/// How a successful `start` call concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The kernel confirmed its identity within the retry budget.
    Confirmed {
        /// Identity reported by the kernel.
        identity: KernelIdentity,
    },
    /// Every readiness probe failed; the kernel is presumed running with a
    /// placeholder identity and telemetry subscriptions are live.
    Degraded,
}

impl StartOutcome {
    /// Whether the start concluded without identity confirmation.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded)
    }
}

/// Abstraction over the readiness poll's pacing so tests run instantly.
pub trait StartupPacer: Send {
    /// Blocks between readiness attempts; `attempt` is the probe that just
    /// failed, starting at 1.
    fn pause(&self, attempt: u32);
}

/// Pacer that sleeps for the fixed readiness delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPacer;

impl SystemPacer {
    /// Builds a new pacer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StartupPacer for SystemPacer {
    fn pause(&self, attempt: u32) {
        debug!(
            target: LIFECYCLE_TARGET,
            attempt,
            delay_ms = READINESS_DELAY.as_millis(),
            "pausing before next readiness probe"
        );
        std::thread::sleep(READINESS_DELAY);
    }
}

impl std::fmt::Debug for dyn StartupPacer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("StartupPacer")
    }
}

/// Owns the kernel's run-state facts and drives its lifecycle.
///
/// All mutations go through one owner (the thread that owns the
/// `Supervisor`); observers receive copies of the state and secondary
/// [`StatusEvent`] broadcasts, never references into live state.
#[derive(Debug)]
pub struct Supervisor {
    control: Box<dyn KernelControl>,
    hub: TelemetryHub,
    state: WorkerState,
    identity: Option<KernelIdentity>,
    pacer: Box<dyn StartupPacer>,
    broadcast: Broadcast,
}

impl Supervisor {
    /// Builds a supervisor over the supplied collaborators.
    #[must_use]
    pub fn new(
        control: Box<dyn KernelControl>,
        transport: Box<dyn EventTransport>,
        pacer: Box<dyn StartupPacer>,
    ) -> Self {
        Self {
            control,
            hub: TelemetryHub::new(transport),
            state: WorkerState::default(),
            identity: None,
            pacer,
            broadcast: Broadcast::new(),
        }
    }

    /// Registers a passive observer of status events.
    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<StatusEvent> {
        self.broadcast.subscribe()
    }

    /// Publishes an event to the passive observers.
    ///
    /// Components outside the supervisor (e.g. the update checker) share
    /// its broadcast so observers have one stream to watch.
    pub fn publish(&mut self, event: &StatusEvent) {
        self.broadcast.publish(event);
    }

    /// Seeds the mode fact from persisted state.
    ///
    /// Startup-only: no boundary calls are issued and no change is
    /// broadcast, since nothing has changed from the restored world's
    /// point of view.
    pub fn restore_mode(&mut self, mode: bosun_config::ProxyMode) {
        self.state.mode = mode;
    }

    /// Copy-out read of the run-state facts.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        WorkerState {
            uptime_seconds: self.hub.uptime_seconds(),
            ..self.state
        }
    }

    /// Copy-out read of the telemetry snapshot.
    #[must_use]
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.hub.snapshot()
    }

    /// Identity recorded by the most recent start, when any.
    #[must_use]
    pub fn identity(&self) -> Option<&KernelIdentity> {
        self.identity.as_ref()
    }

    /// Starts the kernel.
    ///
    /// The start command itself is never retried: a rejected command is
    /// fatal to this call. Once accepted, all counters are zeroed before
    /// any subscription opens, then the readiness poll probes the kernel's
    /// identity up to [`READINESS_ATTEMPTS`] times. Exhausting the budget
    /// still presumes the kernel running (degraded start) rather than
    /// blocking indefinitely.
    pub fn start(&mut self) -> Result<StartOutcome, LifecycleError> {
        self.control
            .start_kernel()
            .map_err(|source| LifecycleError::Start { source })?;

        // No stale data may be visible during the readiness window.
        self.hub.reset();

        let confirmed = self.poll_readiness();
        let outcome = match confirmed {
            Some(identity) => {
                info!(
                    target: LIFECYCLE_TARGET,
                    version = %identity.version,
                    "kernel confirmed ready"
                );
                self.identity = Some(identity.clone());
                StartOutcome::Confirmed { identity }
            }
            None => {
                warn!(
                    target: LIFECYCLE_TARGET,
                    attempts = READINESS_ATTEMPTS,
                    "kernel never confirmed identity; continuing degraded"
                );
                self.identity = Some(KernelIdentity::placeholder());
                StartOutcome::Degraded
            }
        };

        self.set_running(true);
        self.hub.open();
        Ok(outcome)
    }

    /// Stops the kernel.
    ///
    /// Cleanup is guaranteed: whatever the boundary call reports, every
    /// subscription is closed and all local state is reset before this
    /// returns. A boundary failure is still surfaced as the call's error.
    pub fn stop(&mut self) -> Result<(), LifecycleError> {
        let result = self
            .control
            .stop_kernel()
            .map_err(|source| LifecycleError::Stop { source });

        self.hub.close();
        self.hub.reset();
        self.identity = None;
        self.set_running(false);

        if result.is_ok() {
            info!(target: LIFECYCLE_TARGET, "kernel stopped");
        }
        result
    }

    /// Restarts the kernel: strictly `stop` followed by `start`.
    ///
    /// A stop failure is logged and the sequence proceeds; local cleanup has
    /// already happened by then.
    pub fn restart(&mut self) -> Result<StartOutcome, LifecycleError> {
        if let Err(error) = self.stop() {
            warn!(
                target: LIFECYCLE_TARGET,
                error = %error,
                "stop failed during restart; proceeding to start"
            );
        }
        self.start()
    }

    /// Runs the bounded readiness poll, returning the confirmed identity.
    fn poll_readiness(&mut self) -> Option<KernelIdentity> {
        for attempt in 1..=READINESS_ATTEMPTS {
            match self.control.identity() {
                Ok(identity) => return Some(identity),
                Err(error) => {
                    debug!(
                        target: LIFECYCLE_TARGET,
                        attempt,
                        error = %error,
                        "readiness probe failed"
                    );
                    if attempt < READINESS_ATTEMPTS {
                        self.pacer.pause(attempt);
                    }
                }
            }
        }
        None
    }

    /// Flips the running flag, publishing only on actual transitions.
    fn set_running(&mut self, running: bool) {
        if self.state.running == running {
            return;
        }
        self.state.running = running;
        self.state.uptime_seconds = 0;
        self.broadcast
            .publish(&StatusEvent::RunningChanged { running });
    }

    pub(crate) fn control_mut(&mut self) -> &mut dyn KernelControl {
        self.control.as_mut()
    }

    pub(crate) fn state_mut(&mut self) -> &mut WorkerState {
        &mut self.state
    }

    pub(crate) fn broadcast_mut(&mut self) -> &mut Broadcast {
        &mut self.broadcast
    }
}
