//! Child-process management for the kernel worker.

use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::config::KernelLaunchPlan;
use crate::control::ControlError;

const PROCESS_TARGET: &str = "bosun_kernel::adapter";

/// Grace period between the stop signal and a forced kill.
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Where the kernel child process currently stands.
pub(super) enum KernelProcessState {
    /// No process has been launched.
    NotStarted,
    /// The process is running.
    Running {
        /// The child process handle.
        child: Child,
    },
    /// The process was stopped.
    Stopped,
}

/// Spawns the kernel worker process.
pub(super) fn spawn_kernel(plan: &KernelLaunchPlan) -> Result<Child, ControlError> {
    debug!(
        target: PROCESS_TARGET,
        binary = %plan.binary(),
        work_dir = %plan.work_dir(),
        "spawning kernel process"
    );

    let child = Command::new(plan.binary().as_std_path())
        .arg("run")
        .arg("-D")
        .arg(plan.work_dir().as_std_path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                ControlError::with_source(
                    format!("kernel binary not found: {}", plan.binary()),
                    error,
                )
            } else {
                ControlError::with_source(
                    format!("failed to spawn kernel process '{}'", plan.binary()),
                    error,
                )
            }
        })?;

    debug!(
        target: PROCESS_TARGET,
        pid = child.id(),
        "kernel process spawned"
    );
    Ok(child)
}

/// Validates the kernel configuration with the kernel's own checker.
pub(super) fn check_kernel_config(plan: &KernelLaunchPlan) -> Result<(), ControlError> {
    let output = Command::new(plan.binary().as_std_path())
        .arg("check")
        .arg("-c")
        .arg(plan.config_path().as_std_path())
        .output()
        .map_err(|error| {
            ControlError::with_source("failed to run kernel configuration check", error)
        })?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(ControlError::new(format!(
        "kernel rejected its configuration: {}",
        stderr.trim()
    )))
}

/// Captures `<binary> version` output for the identity fallback.
pub(super) fn version_output(plan: &KernelLaunchPlan) -> Result<String, ControlError> {
    let output = Command::new(plan.binary().as_std_path())
        .arg("version")
        .output()
        .map_err(|error| ControlError::with_source("failed to query kernel version", error))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ControlError::new(format!(
            "kernel version query failed: {}",
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Terminates the kernel child, signalling first and killing after the
/// grace period.
pub(super) fn terminate_child(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(target: PROCESS_TARGET, ?status, "kernel already exited");
            return;
        }
        Ok(None) => {}
        Err(error) => {
            warn!(
                target: PROCESS_TARGET,
                error = %error,
                "failed to check kernel status before terminating"
            );
        }
    }

    let pid = Pid::from_raw(child.id() as i32);
    if let Err(errno) = kill(pid, Signal::SIGTERM) {
        debug!(
            target: PROCESS_TARGET,
            %errno,
            "stop signal not delivered; killing directly"
        );
    }
    thread::sleep(TERMINATE_GRACE);

    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(target: PROCESS_TARGET, ?status, "kernel exited after stop signal");
        }
        Ok(None) | Err(_) => {
            warn!(
                target: PROCESS_TARGET,
                "kernel did not exit within the grace period; killing"
            );
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
