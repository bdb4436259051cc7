//! Error types surfaced by the supervisor's lifecycle and mode operations.

use bosun_config::ProxyMode;
use thiserror::Error;

use crate::control::ControlError;

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The kernel-start boundary call was rejected.
    ///
    /// Fatal to the `start` call; the readiness retry budget applies only
    /// after the start command has been accepted.
    #[error("failed to start the kernel: {source}")]
    Start {
        /// Underlying boundary error.
        #[source]
        source: ControlError,
    },

    /// The kernel-stop boundary call failed.
    ///
    /// Local cleanup (subscriptions closed, telemetry zeroed) has already
    /// completed by the time this is returned.
    #[error("failed to stop the kernel: {source}")]
    Stop {
        /// Underlying boundary error.
        #[source]
        source: ControlError,
    },
}

/// Errors returned by mode-switch operations.
#[derive(Debug, Error)]
pub enum ModeSwitchError {
    /// The boundary call applying the target mode failed; the mode fact is
    /// unchanged.
    #[error("failed to apply {mode} mode: {source}")]
    Apply {
        /// Mode that was being applied.
        mode: ProxyMode,
        /// Underlying boundary error.
        #[source]
        source: ControlError,
    },

    /// The elevated relaunch could not be invoked; the mode fact is
    /// unchanged.
    #[error("failed to relaunch with elevated privileges: {source}")]
    Relaunch {
        /// Underlying boundary error.
        #[source]
        source: ControlError,
    },
}
