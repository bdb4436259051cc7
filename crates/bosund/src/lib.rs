//! Runtime wiring for the bosun supervisor.
//!
//! `bosund` sits between a user-facing shell and the long-running proxy
//! kernel. Bootstrap loads configuration, initialises structured logging,
//! and restores persisted facts; every collaborator is then constructed
//! explicitly and injected: the process/API kernel binding, the websocket
//! event transport, the supervisor owner thread ([`ControlLoop`]), and the
//! coalescing tray resync loop. The process then parks on the shutdown
//! signal and stops the kernel on the way out.

mod bootstrap;
mod report;
mod runtime;
mod shutdown;
pub mod telemetry;
mod update;

use std::sync::Arc;
use std::sync::mpsc::channel;
use std::thread;

use thiserror::Error;
use tracing::warn;

use bosun_kernel::adapter::{ProcessKernel, WsEventTransport};
use bosun_kernel::{ControlError, DownloadStage, StatusEvent, Supervisor, SystemPacer};
use bosun_tray::{NoticeSink, ResyncController, TracingNoticeSink};

pub use bootstrap::{
    Boot, BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use report::{StatusReporter, StructuredStatusReporter};
pub use runtime::{ControlLoop, LoggingPresenter, RequestError, SupervisorClient};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use update::{
    GithubReleaseFeed, ReleaseFeed, ReleaseInfo, UpdateError, check_for_update, download_artefact,
};

/// Supervisor version advertised to the release feed.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors that terminate the supervisor.
#[derive(Debug, Error)]
pub enum RunError {
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The kernel binding could not be constructed.
    #[error("failed to construct the kernel binding: {source}")]
    Control {
        /// Underlying boundary error.
        #[source]
        source: ControlError,
    },
    /// Waiting for the shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Runs the supervisor with the production collaborators.
pub fn run() -> Result<(), RunError> {
    let reporter: Arc<dyn StatusReporter> = Arc::new(StructuredStatusReporter::new());
    let boot = bootstrap_with(&SystemConfigLoader, &reporter)?;

    let control = ProcessKernel::from_config(boot.config())
        .map_err(|source| RunError::Control { source })?;
    let transport = WsEventTransport::new(boot.config().api_endpoint());
    let mut supervisor = Supervisor::new(
        Box::new(control),
        Box::new(transport),
        Box::new(SystemPacer::new()),
    );
    supervisor.restore_mode(boot.facts().last_mode);

    let (tray_sender, tray_source) = channel();
    thread::spawn(move || {
        ResyncController::new(tray_source, Box::new(LoggingPresenter::new())).run();
    });

    let client = ControlLoop::spawn(
        supervisor,
        boot.config().state_path().to_path_buf(),
        boot.facts().clone(),
        tray_sender,
        Arc::clone(&reporter),
    );

    let notices = TracingNoticeSink::new();
    resume_kernel_intent(&client, boot.facts().kernel_running, &notices);
    spawn_update_check(boot.config().release_feed().clone(), client.clone());

    SystemShutdownSignal::new().wait()?;

    if let Ok(state) = client.state()
        && state.running
        && let Err(error) = client.stop()
    {
        warn!(error = %error, "failed to stop the kernel during shutdown");
    }
    Ok(())
}

/// Restores the persisted running intent, reporting the outcome.
fn resume_kernel_intent(client: &SupervisorClient, wanted_running: bool, notices: &impl NoticeSink) {
    if !wanted_running {
        return;
    }
    match client.start() {
        Ok(outcome) if outcome.is_degraded() => {
            notices.warning("Kernel resumed without identity confirmation");
        }
        Ok(_) => notices.success("Kernel resumed"),
        Err(error) => notices.error(format!("Failed to resume the kernel: {error}")),
    }
}

/// Checks the release feed once in the background.
fn spawn_update_check(feed_url: url::Url, client: SupervisorClient) {
    thread::spawn(move || {
        let feed = match GithubReleaseFeed::new(feed_url) {
            Ok(feed) => feed,
            Err(error) => {
                warn!(error = %error, "release feed unavailable");
                return;
            }
        };
        let _ = client.publish(StatusEvent::DownloadProgress {
            stage: DownloadStage::Checking,
            percent: 0,
            message: "Checking for updates".to_owned(),
        });
        match check_for_update(&feed, VERSION) {
            Ok(Some(release)) => {
                let _ = client.publish(StatusEvent::UpdateAvailable {
                    latest_version: release.version,
                    download_url: release.download_url,
                });
            }
            Ok(None) => {}
            Err(error) => warn!(error = %error, "update check failed"),
        }
    });
}
