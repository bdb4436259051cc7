//! Structured reporting of supervisor lifecycle events.

use std::sync::Arc;

use bosun_config::{Config, ProxyMode};
use bosun_kernel::{LifecycleError, ModeSwitchError, ModeSwitchOutcome, StartOutcome};

use crate::bootstrap::BootstrapError;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait StatusReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked after a start or restart resolves.
    fn kernel_started(&self, outcome: &StartOutcome);

    /// Invoked when a start or restart fails.
    fn kernel_start_failed(&self, error: &LifecycleError);

    /// Invoked after a stop resolves, successfully or not.
    fn kernel_stopped(&self, error: Option<&LifecycleError>);

    /// Invoked after a mode switch resolves.
    fn mode_switched(&self, target: ProxyMode, outcome: &ModeSwitchOutcome);

    /// Invoked when a mode switch fails.
    fn mode_switch_failed(&self, target: ProxyMode, error: &ModeSwitchError);
}

impl<T> StatusReporter for Arc<T>
where
    T: StatusReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn kernel_started(&self, outcome: &StartOutcome) {
        (**self).kernel_started(outcome);
    }

    fn kernel_start_failed(&self, error: &LifecycleError) {
        (**self).kernel_start_failed(error);
    }

    fn kernel_stopped(&self, error: Option<&LifecycleError>) {
        (**self).kernel_stopped(error);
    }

    fn mode_switched(&self, target: ProxyMode, outcome: &ModeSwitchOutcome) {
        (**self).mode_switched(target, outcome);
    }

    fn mode_switch_failed(&self, target: ProxyMode, error: &ModeSwitchError) {
        (**self).mode_switch_failed(target, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredStatusReporter;

impl StructuredStatusReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StatusReporter for StructuredStatusReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "bosund::report",
            event = "bootstrap_starting",
            "starting supervisor bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "bosund::report",
            event = "bootstrap_succeeded",
            kernel_dir = %config.kernel_dir(),
            api = %config.api_endpoint(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "supervisor bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "bosund::report",
            event = "bootstrap_failed",
            error = %error,
            "supervisor bootstrap failed"
        );
    }

    fn kernel_started(&self, outcome: &StartOutcome) {
        tracing::info!(
            target: "bosund::report",
            event = "kernel_started",
            degraded = outcome.is_degraded(),
            "kernel start resolved"
        );
    }

    fn kernel_start_failed(&self, error: &LifecycleError) {
        tracing::error!(
            target: "bosund::report",
            event = "kernel_start_failed",
            error = %error,
            "kernel start failed"
        );
    }

    fn kernel_stopped(&self, error: Option<&LifecycleError>) {
        match error {
            None => tracing::info!(
                target: "bosund::report",
                event = "kernel_stopped",
                "kernel stop resolved"
            ),
            Some(error) => tracing::warn!(
                target: "bosund::report",
                event = "kernel_stopped",
                error = %error,
                "kernel stop reported a failure after cleanup"
            ),
        }
    }

    fn mode_switched(&self, target: ProxyMode, outcome: &ModeSwitchOutcome) {
        tracing::info!(
            target: "bosund::report",
            event = "mode_switched",
            mode = %target,
            outcome = ?outcome,
            "mode switch resolved"
        );
    }

    fn mode_switch_failed(&self, target: ProxyMode, error: &ModeSwitchError) {
        tracing::error!(
            target: "bosund::report",
            event = "mode_switch_failed",
            mode = %target,
            error = %error,
            "mode switch failed"
        );
    }
}
