//! Run-state facts owned by the supervisor.

use bosun_config::ProxyMode;

/// Facts describing the kernel worker as the supervisor sees it.
///
/// The supervisor's owner thread is the single writer; everyone else
/// receives copies. `uptime_seconds` resets to zero exactly when `running`
/// flips in either direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerState {
    /// Whether the kernel is presumed running.
    pub running: bool,
    /// Currently applied proxy mode.
    pub mode: ProxyMode,
    /// Seconds since the kernel was last confirmed or presumed started.
    pub uptime_seconds: u64,
}
