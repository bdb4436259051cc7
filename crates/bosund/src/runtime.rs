//! Owner-thread control loop for the supervisor.
//!
//! The [`Supervisor`] and every fact it owns live on one thread; all
//! mutation arrives as messages and executes strictly in submission order,
//! each request completing (including its cleanup) before the next begins.
//! Derived tray facts are forwarded only when they actually change, and the
//! persisted facts file is rewritten whenever a persisted fact moves.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use bosun_config::{PersistedFacts, ProxyMode};
use bosun_kernel::{
    ControlError, KernelIdentity, LifecycleError, ModeSwitchError, ModeSwitchOutcome, ProxyEntry,
    RouteRule, StartOutcome, StatusEvent, Supervisor, TelemetrySnapshot, WorkerState,
};
use bosun_tray::{PresenterError, TrayFacts, TrayModel, TrayPresenter};

use crate::report::StatusReporter;

const RUNTIME_TARGET: &str = "bosund::runtime";

/// Errors raised when talking to the control loop.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The control loop has terminated; no further requests can be served.
    #[error("the supervisor control loop has terminated")]
    LoopStopped,
    /// The lifecycle operation failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// The mode switch failed.
    #[error(transparent)]
    ModeSwitch(#[from] ModeSwitchError),
    /// The boundary call failed.
    #[error(transparent)]
    Control(#[from] ControlError),
}

enum Request {
    Start {
        reply: Sender<Result<StartOutcome, LifecycleError>>,
    },
    Stop {
        reply: Sender<Result<(), LifecycleError>>,
    },
    Restart {
        reply: Sender<Result<StartOutcome, LifecycleError>>,
    },
    SwitchMode {
        target: ProxyMode,
        reply: Sender<Result<ModeSwitchOutcome, ModeSwitchError>>,
    },
    ToggleIpVersion {
        prefer_ipv6: bool,
        reply: Sender<Result<(), ControlError>>,
    },
    Proxies {
        reply: Sender<Result<Vec<ProxyEntry>, ControlError>>,
    },
    Rules {
        reply: Sender<Result<Vec<RouteRule>, ControlError>>,
    },
    ActiveConfig {
        reply: Sender<Result<String, ControlError>>,
    },
    Latency {
        proxy: String,
        probe_url: Option<String>,
        reply: Sender<Result<u64, ControlError>>,
    },
    LatencySweep {
        proxies: Vec<String>,
        probe_url: Option<String>,
        reply: Sender<Vec<(String, Option<u64>)>>,
    },
    State {
        reply: Sender<WorkerState>,
    },
    Telemetry {
        reply: Sender<TelemetrySnapshot>,
    },
    Identity {
        reply: Sender<Option<KernelIdentity>>,
    },
    SubscribeEvents {
        reply: Sender<Receiver<StatusEvent>>,
    },
    Publish {
        event: StatusEvent,
    },
    SetActiveProfile {
        name: Option<String>,
    },
    RecordWindow {
        visible: bool,
        route: String,
    },
}

/// Cloneable handle submitting requests to the control loop.
#[derive(Debug, Clone)]
pub struct SupervisorClient {
    requests: Sender<Request>,
}

impl SupervisorClient {
    fn call<T>(&self, build: impl FnOnce(Sender<T>) -> Request) -> Result<T, RequestError> {
        let (reply, response) = channel();
        self.requests
            .send(build(reply))
            .map_err(|_| RequestError::LoopStopped)?;
        response.recv().map_err(|_| RequestError::LoopStopped)
    }

    fn send(&self, request: Request) -> Result<(), RequestError> {
        self.requests
            .send(request)
            .map_err(|_| RequestError::LoopStopped)
    }

    /// Starts the kernel.
    pub fn start(&self) -> Result<StartOutcome, RequestError> {
        Ok(self.call(|reply| Request::Start { reply })??)
    }

    /// Stops the kernel.
    pub fn stop(&self) -> Result<(), RequestError> {
        Ok(self.call(|reply| Request::Stop { reply })??)
    }

    /// Restarts the kernel.
    pub fn restart(&self) -> Result<StartOutcome, RequestError> {
        Ok(self.call(|reply| Request::Restart { reply })??)
    }

    /// Requests a proxy-mode switch.
    pub fn switch_mode(&self, target: ProxyMode) -> Result<ModeSwitchOutcome, RequestError> {
        Ok(self.call(|reply| Request::SwitchMode { target, reply })??)
    }

    /// Switches the kernel's DNS strategy.
    pub fn toggle_ip_version(&self, prefer_ipv6: bool) -> Result<(), RequestError> {
        Ok(self.call(|reply| Request::ToggleIpVersion { prefer_ipv6, reply })??)
    }

    /// Lists proxies and selector groups.
    pub fn proxies(&self) -> Result<Vec<ProxyEntry>, RequestError> {
        Ok(self.call(|reply| Request::Proxies { reply })??)
    }

    /// Lists routing rules.
    pub fn rules(&self) -> Result<Vec<RouteRule>, RequestError> {
        Ok(self.call(|reply| Request::Rules { reply })??)
    }

    /// Returns the kernel's active configuration document.
    pub fn active_config(&self) -> Result<String, RequestError> {
        Ok(self.call(|reply| Request::ActiveConfig { reply })??)
    }

    /// Probes one proxy's latency.
    pub fn latency(&self, proxy: &str, probe_url: Option<&str>) -> Result<u64, RequestError> {
        Ok(self.call(|reply| Request::Latency {
            proxy: proxy.to_owned(),
            probe_url: probe_url.map(str::to_owned),
            reply,
        })??)
    }

    /// Probes a batch of proxies, reporting per-node outcomes as events.
    pub fn latency_sweep(
        &self,
        proxies: Vec<String>,
        probe_url: Option<&str>,
    ) -> Result<Vec<(String, Option<u64>)>, RequestError> {
        self.call(|reply| Request::LatencySweep {
            proxies,
            probe_url: probe_url.map(str::to_owned),
            reply,
        })
    }

    /// Copy-out read of the run-state facts.
    pub fn state(&self) -> Result<WorkerState, RequestError> {
        self.call(|reply| Request::State { reply })
    }

    /// Copy-out read of the telemetry snapshot.
    pub fn telemetry(&self) -> Result<TelemetrySnapshot, RequestError> {
        self.call(|reply| Request::Telemetry { reply })
    }

    /// Identity recorded by the most recent start.
    pub fn identity(&self) -> Result<Option<KernelIdentity>, RequestError> {
        self.call(|reply| Request::Identity { reply })
    }

    /// Registers a passive observer of status events.
    pub fn subscribe_events(&self) -> Result<Receiver<StatusEvent>, RequestError> {
        self.call(|reply| Request::SubscribeEvents { reply })
    }

    /// Publishes an event to the passive observers.
    pub fn publish(&self, event: StatusEvent) -> Result<(), RequestError> {
        self.send(Request::Publish { event })
    }

    /// Records the active profile name used in derived views.
    pub fn set_active_profile(&self, name: Option<String>) -> Result<(), RequestError> {
        self.send(Request::SetActiveProfile { name })
    }

    /// Records window bookkeeping in the persisted facts.
    pub fn record_window(&self, visible: bool, route: impl Into<String>) -> Result<(), RequestError> {
        self.send(Request::RecordWindow {
            visible,
            route: route.into(),
        })
    }
}

/// Rewrites the persisted facts file whenever a persisted fact changes.
struct FactsPersister {
    path: Utf8PathBuf,
    facts: PersistedFacts,
}

impl FactsPersister {
    fn new(path: Utf8PathBuf, facts: PersistedFacts) -> Self {
        Self { path, facts }
    }

    fn record(&mut self, update: impl FnOnce(&mut PersistedFacts)) {
        let before = self.facts.clone();
        update(&mut self.facts);
        if self.facts == before {
            return;
        }
        if let Err(error) = self.facts.store(&self.path) {
            warn!(
                target: RUNTIME_TARGET,
                error = %error,
                "failed to persist supervisor facts"
            );
        }
    }
}

/// The owner thread driving the supervisor.
pub struct ControlLoop {
    supervisor: Supervisor,
    persister: FactsPersister,
    tray: Sender<TrayFacts>,
    reporter: Arc<dyn StatusReporter>,
    active_profile: Option<String>,
    last_tray: Option<TrayFacts>,
}

impl ControlLoop {
    /// Spawns the loop and returns the client handle.
    ///
    /// The loop exits once every client clone is dropped.
    #[must_use]
    pub fn spawn(
        supervisor: Supervisor,
        state_path: Utf8PathBuf,
        facts: PersistedFacts,
        tray: Sender<TrayFacts>,
        reporter: Arc<dyn StatusReporter>,
    ) -> SupervisorClient {
        let (requests, inbox) = channel();
        let mut control_loop = Self {
            supervisor,
            persister: FactsPersister::new(state_path, facts),
            tray,
            reporter,
            active_profile: None,
            last_tray: None,
        };
        thread::spawn(move || {
            control_loop.run(&inbox);
        });
        SupervisorClient { requests }
    }

    fn run(&mut self, inbox: &Receiver<Request>) {
        // Seed the derived view with the restored facts.
        self.sync_tray();
        for request in inbox.iter() {
            self.handle(request);
            self.sync_tray();
        }
        debug!(target: RUNTIME_TARGET, "all clients dropped; control loop exiting");
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Start { reply } => {
                let result = self.supervisor.start();
                self.report_start(&result);
                self.persist_running();
                let _ = reply.send(result);
            }
            Request::Stop { reply } => {
                let result = self.supervisor.stop();
                self.reporter.kernel_stopped(result.as_ref().err());
                self.persist_running();
                let _ = reply.send(result);
            }
            Request::Restart { reply } => {
                let result = self.supervisor.restart();
                self.report_start(&result);
                self.persist_running();
                let _ = reply.send(result);
            }
            Request::SwitchMode { target, reply } => {
                let result = self.supervisor.switch_mode(target);
                match &result {
                    Ok(outcome) => self.reporter.mode_switched(target, outcome),
                    Err(error) => self.reporter.mode_switch_failed(target, error),
                }
                let mode = self.supervisor.state().mode;
                self.persister.record(|facts| facts.last_mode = mode);
                self.persist_running();
                let _ = reply.send(result);
            }
            Request::ToggleIpVersion { prefer_ipv6, reply } => {
                let _ = reply.send(self.supervisor.toggle_ip_version(prefer_ipv6));
            }
            Request::Proxies { reply } => {
                let _ = reply.send(self.supervisor.proxies());
            }
            Request::Rules { reply } => {
                let _ = reply.send(self.supervisor.rules());
            }
            Request::ActiveConfig { reply } => {
                let _ = reply.send(self.supervisor.active_config());
            }
            Request::Latency {
                proxy,
                probe_url,
                reply,
            } => {
                let _ = reply.send(self.supervisor.latency(&proxy, probe_url.as_deref()));
            }
            Request::LatencySweep {
                proxies,
                probe_url,
                reply,
            } => {
                let _ = reply.send(
                    self.supervisor
                        .latency_sweep(&proxies, probe_url.as_deref()),
                );
            }
            Request::State { reply } => {
                let _ = reply.send(self.supervisor.state());
            }
            Request::Telemetry { reply } => {
                let _ = reply.send(self.supervisor.telemetry());
            }
            Request::Identity { reply } => {
                let _ = reply.send(self.supervisor.identity().cloned());
            }
            Request::SubscribeEvents { reply } => {
                let _ = reply.send(self.supervisor.subscribe());
            }
            Request::Publish { event } => {
                self.supervisor.publish(&event);
            }
            Request::SetActiveProfile { name } => {
                if self.active_profile != name {
                    self.active_profile = name;
                    self.supervisor.publish(&StatusEvent::MenuRefreshRequested);
                }
            }
            Request::RecordWindow { visible, route } => {
                self.persister.record(|facts| {
                    facts.window_visible = visible;
                    facts.last_route = route;
                });
            }
        }
    }

    fn report_start(&self, result: &Result<StartOutcome, LifecycleError>) {
        match result {
            Ok(outcome) => self.reporter.kernel_started(outcome),
            Err(error) => self.reporter.kernel_start_failed(error),
        }
    }

    fn persist_running(&mut self) {
        let running = self.supervisor.state().running;
        self.persister.record(|facts| facts.kernel_running = running);
    }

    /// Forwards derived facts to the tray, suppressing redundant updates.
    fn sync_tray(&mut self) {
        let state = self.supervisor.state();
        let facts = TrayFacts {
            running: state.running,
            mode: state.mode,
            active_profile: self.active_profile.clone(),
        };
        if self.last_tray.as_ref() == Some(&facts) {
            return;
        }
        if self.tray.send(facts.clone()).is_err() {
            debug!(target: RUNTIME_TARGET, "tray resync loop is gone");
        }
        self.last_tray = Some(facts);
    }
}

/// Presenter used when no rendering surface is attached.
///
/// The supervisor stays fully functional headless; refreshes land in the
/// structured log instead of a desktop tray.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPresenter;

impl LoggingPresenter {
    /// Builds a new presenter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TrayPresenter for LoggingPresenter {
    fn apply(&mut self, model: &TrayModel) -> Result<(), PresenterError> {
        debug!(
            target: RUNTIME_TARGET,
            tooltip = %model.tooltip,
            entries = model.entries.len(),
            "tray model refreshed"
        );
        Ok(())
    }

    fn rebuild(&mut self, model: &TrayModel) -> Result<(), PresenterError> {
        debug!(
            target: RUNTIME_TARGET,
            tooltip = %model.tooltip,
            "tray presentation rebuilt"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_kernel::{
        EventCategory, EventSubscription, EventTransport, KernelControl, RawEvent, StartupPacer,
        TransportError,
    };
    use rstest::rstest;
    use std::sync::mpsc;

    struct NullKernel;

    impl KernelControl for NullKernel {
        fn start_kernel(&mut self) -> Result<(), ControlError> {
            Ok(())
        }
        fn stop_kernel(&mut self) -> Result<(), ControlError> {
            Ok(())
        }
        fn identity(&mut self) -> Result<KernelIdentity, ControlError> {
            Ok(KernelIdentity::new("test"))
        }
        fn set_system_mode(&mut self) -> Result<(), ControlError> {
            Ok(())
        }
        fn set_tun_mode(&mut self) -> Result<(), ControlError> {
            Ok(())
        }
        fn is_elevated(&mut self) -> Result<bool, ControlError> {
            Ok(true)
        }
        fn relaunch_elevated(&mut self) -> Result<(), ControlError> {
            Ok(())
        }
        fn toggle_ip_version(&mut self, _prefer_ipv6: bool) -> Result<(), ControlError> {
            Ok(())
        }
        fn proxies(&mut self) -> Result<Vec<ProxyEntry>, ControlError> {
            Ok(Vec::new())
        }
        fn latency(&mut self, _proxy: &str, _probe_url: Option<&str>) -> Result<u64, ControlError> {
            Ok(1)
        }
        fn rules(&mut self) -> Result<Vec<RouteRule>, ControlError> {
            Ok(Vec::new())
        }
        fn active_config(&mut self) -> Result<String, ControlError> {
            Ok("{}".to_owned())
        }
    }

    struct NullTransport;

    struct NullSubscription(EventCategory);

    impl EventSubscription for NullSubscription {
        fn category(&self) -> EventCategory {
            self.0
        }
        fn close(&mut self) {}
    }

    impl EventTransport for NullTransport {
        fn subscribe(
            &mut self,
            category: EventCategory,
            _sink: mpsc::Sender<RawEvent>,
        ) -> Result<Box<dyn EventSubscription>, TransportError> {
            Ok(Box::new(NullSubscription(category)))
        }
    }

    struct InstantPacer;

    impl StartupPacer for InstantPacer {
        fn pause(&self, _attempt: u32) {}
    }

    fn spawn_loop(dir: &tempfile::TempDir) -> (SupervisorClient, Receiver<TrayFacts>) {
        let supervisor = Supervisor::new(
            Box::new(NullKernel),
            Box::new(NullTransport),
            Box::new(InstantPacer),
        );
        let state_path = Utf8PathBuf::from_path_buf(dir.path().join("state.json"))
            .unwrap_or_else(|_| panic!("temp path should be UTF-8"));
        let (tray_tx, tray_rx) = channel();
        let client = ControlLoop::spawn(
            supervisor,
            state_path,
            PersistedFacts::default(),
            tray_tx,
            Arc::new(crate::report::StructuredStatusReporter::new()),
        );
        (client, tray_rx)
    }

    #[rstest]
    fn requests_execute_in_submission_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (client, _tray) = spawn_loop(&dir);

        client.start().expect("start should succeed");
        assert!(client.state().expect("state").running);
        client.restart().expect("restart should succeed");
        assert!(client.state().expect("state").running);
        client.stop().expect("stop should succeed");
        assert!(!client.state().expect("state").running);
    }

    #[rstest]
    fn tray_facts_are_sent_only_on_change() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (client, tray) = spawn_loop(&dir);

        // The seed update reflects the restored facts.
        let seed = tray.recv().expect("seed facts");
        assert!(!seed.running);

        client.start().expect("start should succeed");
        let after_start = tray.recv().expect("facts after start");
        assert!(after_start.running);

        // Queries change nothing, so nothing further is sent.
        let _ = client.telemetry().expect("telemetry");
        let _ = client.identity().expect("identity");
        assert!(tray.try_recv().is_err());
    }

    #[rstest]
    fn mode_switches_persist_the_new_mode() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (client, _tray) = spawn_loop(&dir);

        client
            .switch_mode(ProxyMode::Tun)
            .expect("switch should succeed");

        let state_path = Utf8PathBuf::from_path_buf(dir.path().join("state.json"))
            .unwrap_or_else(|_| panic!("temp path should be UTF-8"));
        let persisted = PersistedFacts::load(&state_path).expect("persisted facts");
        assert_eq!(persisted.last_mode, ProxyMode::Tun);
    }

    #[rstest]
    fn published_events_reach_subscribers() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (client, _tray) = spawn_loop(&dir);

        let events = client.subscribe_events().expect("subscription");
        client
            .publish(StatusEvent::MenuRefreshRequested)
            .expect("publish");
        // A query forces the loop to have processed the publish.
        let _ = client.state().expect("state");

        assert_eq!(events.try_recv().ok(), Some(StatusEvent::MenuRefreshRequested));
    }
}
