//! Proxy-mode state machine, including privilege escalation and the
//! cascading restart.

use bosun_config::ProxyMode;
use tracing::{info, warn};

use crate::errors::{LifecycleError, ModeSwitchError};
use crate::lifecycle::{StartOutcome, Supervisor};
use crate::notify::StatusEvent;

const MODE_TARGET: &str = "bosun_kernel::mode";

/// What happened to the kernel after a successful mode change.
#[derive(Debug)]
pub enum RestartDisposition {
    /// The kernel was not running; no restart was needed.
    NotRunning,
    /// The cascaded restart completed.
    Restarted(StartOutcome),
    /// The cascaded restart failed; the mode fact is NOT rolled back, since
    /// mode and run-state are independent facts.
    Failed(LifecycleError),
}

/// Result of a mode-switch request.
#[derive(Debug)]
pub enum ModeSwitchOutcome {
    /// The target equalled the current mode; no boundary calls were issued.
    Unchanged,
    /// The mode was applied, with the disposition of the cascaded restart.
    Applied {
        /// Newly applied mode.
        mode: ProxyMode,
        /// Outcome of the cascade.
        restart: RestartDisposition,
    },
    /// Elevation is required: the current process context must terminate
    /// and re-enter elevated. The mode fact is unchanged — the switch is
    /// not applied until the elevated re-entry completes it.
    RelaunchRequired,
}

impl Supervisor {
    /// Requests a transition to `target`.
    ///
    /// The returned value is the authoritative result; the
    /// [`StatusEvent::ModeChanged`] broadcast is a secondary signal for
    /// passive observers only.
    pub fn switch_mode(
        &mut self,
        target: ProxyMode,
    ) -> Result<ModeSwitchOutcome, ModeSwitchError> {
        if target == self.state().mode {
            return Ok(ModeSwitchOutcome::Unchanged);
        }

        match target {
            ProxyMode::System => {
                self.control_mut()
                    .set_system_mode()
                    .map_err(|source| ModeSwitchError::Apply {
                        mode: ProxyMode::System,
                        source,
                    })?;
            }
            ProxyMode::Tun => {
                if !self.confirm_elevated() {
                    self.control_mut()
                        .relaunch_elevated()
                        .map_err(|source| ModeSwitchError::Relaunch { source })?;
                    info!(
                        target: MODE_TARGET,
                        "elevated relaunch requested; mode unchanged until re-entry"
                    );
                    return Ok(ModeSwitchOutcome::RelaunchRequired);
                }
                self.control_mut()
                    .set_tun_mode()
                    .map_err(|source| ModeSwitchError::Apply {
                        mode: ProxyMode::Tun,
                        source,
                    })?;
            }
        }

        self.state_mut().mode = target;
        self.broadcast_mut()
            .publish(&StatusEvent::ModeChanged { mode: target });
        info!(target: MODE_TARGET, mode = %target, "proxy mode applied");

        let restart = if self.state().running {
            match self.restart() {
                Ok(outcome) => RestartDisposition::Restarted(outcome),
                Err(error) => {
                    warn!(
                        target: MODE_TARGET,
                        error = %error,
                        "cascaded restart failed; mode change stands"
                    );
                    RestartDisposition::Failed(error)
                }
            }
        } else {
            RestartDisposition::NotRunning
        };

        Ok(ModeSwitchOutcome::Applied {
            mode: target,
            restart,
        })
    }

    /// Checks elevation, treating a failed check as not elevated.
    fn confirm_elevated(&mut self) -> bool {
        match self.control_mut().is_elevated() {
            Ok(elevated) => elevated,
            Err(error) => {
                warn!(
                    target: MODE_TARGET,
                    error = %error,
                    "elevation check failed; treating as not elevated"
                );
                false
            }
        }
    }
}
