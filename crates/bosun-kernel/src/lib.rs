//! Process lifecycle and telemetry synchronisation for the bosun
//! supervisor.
//!
//! The [`Supervisor`] owns the kernel's run-state facts and drives every
//! boundary operation: lifecycle with a bounded readiness poll
//! ([`lifecycle`]), per-category push-event subscriptions feeding an owned
//! telemetry snapshot ([`subscriptions`], [`telemetry`]), and the
//! privileged proxy-mode state machine ([`mode`]). Concrete collaborators
//! live in [`adapter`]; everything else is expressed against the
//! [`KernelControl`] and [`EventTransport`] traits so tests inject scripted
//! doubles.

pub mod adapter;
mod control;
mod errors;
mod events;
mod lifecycle;
mod mode;
mod notify;
mod roster;
mod state;
mod subscriptions;
mod telemetry;

#[cfg(test)]
mod tests;

pub use bosun_config::ProxyMode;
pub use control::{ControlError, KernelControl, KernelIdentity, ProxyEntry, RouteRule};
pub use errors::{LifecycleError, ModeSwitchError};
pub use events::{EventCategory, EventSubscription, EventTransport, RawEvent, TransportError};
pub use lifecycle::{
    READINESS_ATTEMPTS, READINESS_DELAY, StartOutcome, StartupPacer, Supervisor, SystemPacer,
};
pub use mode::{ModeSwitchOutcome, RestartDisposition};
pub use notify::{Broadcast, DownloadStage, StatusEvent};
pub use state::WorkerState;
pub use subscriptions::TelemetryHub;
pub use telemetry::{
    Connection, ConnectionMetadata, LOG_RING_CAPACITY, LogEntry, MemoryUsage, TelemetrySnapshot,
    TrafficCounters, TransferTotals,
};
