//! Recording doubles and helpers shared by the behaviour tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::control::{ControlError, KernelControl, KernelIdentity, ProxyEntry, RouteRule};
use crate::events::{
    EventCategory, EventSubscription, EventTransport, RawEvent, TransportError,
};
use crate::lifecycle::StartupPacer;

pub(crate) const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds or the timeout elapses.
pub(crate) fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    condition()
}

/// Shared, inspectable log of boundary calls.
pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn read_calls(log: &CallLog) -> Vec<String> {
    log.lock().expect("call log poisoned").clone()
}

/// How the scripted kernel answers elevation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElevationScript {
    Elevated,
    NotElevated,
    CheckFails,
}

/// Scripted [`KernelControl`] double recording every boundary call.
pub(crate) struct ScriptedKernel {
    calls: CallLog,
    fail_start: bool,
    start_budget: Option<usize>,
    fail_stop: bool,
    identity_failures: usize,
    elevation: ElevationScript,
    fail_relaunch: bool,
    fail_set_system: bool,
    fail_set_tun: bool,
}

impl ScriptedKernel {
    pub(crate) fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_start: false,
            start_budget: None,
            fail_stop: false,
            identity_failures: 0,
            elevation: ElevationScript::Elevated,
            fail_relaunch: false,
            fail_set_system: false,
            fail_set_tun: false,
        }
    }

    pub(crate) fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub(crate) fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Lets the first `count` starts succeed, failing every later one.
    pub(crate) fn start_failures_after(mut self, count: usize) -> Self {
        self.start_budget = Some(count);
        self
    }

    pub(crate) fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Fails the first `count` identity probes, then succeeds.
    pub(crate) fn identity_failures(mut self, count: usize) -> Self {
        self.identity_failures = count;
        self
    }

    pub(crate) fn elevation(mut self, script: ElevationScript) -> Self {
        self.elevation = script;
        self
    }

    pub(crate) fn failing_relaunch(mut self) -> Self {
        self.fail_relaunch = true;
        self
    }

    pub(crate) fn failing_set_tun(mut self) -> Self {
        self.fail_set_tun = true;
        self
    }

    fn record(&self, call: &str) {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(call.to_owned());
    }
}

impl KernelControl for ScriptedKernel {
    fn start_kernel(&mut self) -> Result<(), ControlError> {
        self.record("start");
        if self.fail_start {
            return Err(ControlError::new("scripted start failure"));
        }
        if let Some(budget) = self.start_budget.as_mut() {
            if *budget == 0 {
                return Err(ControlError::new("scripted start failure"));
            }
            *budget -= 1;
        }
        Ok(())
    }

    fn stop_kernel(&mut self) -> Result<(), ControlError> {
        self.record("stop");
        if self.fail_stop {
            return Err(ControlError::new("scripted stop failure"));
        }
        Ok(())
    }

    fn identity(&mut self) -> Result<KernelIdentity, ControlError> {
        self.record("identity");
        if self.identity_failures > 0 {
            self.identity_failures -= 1;
            return Err(ControlError::new("scripted identity failure"));
        }
        Ok(KernelIdentity::new("1.9.0"))
    }

    fn set_system_mode(&mut self) -> Result<(), ControlError> {
        self.record("set_system_mode");
        if self.fail_set_system {
            return Err(ControlError::new("scripted system-mode failure"));
        }
        Ok(())
    }

    fn set_tun_mode(&mut self) -> Result<(), ControlError> {
        self.record("set_tun_mode");
        if self.fail_set_tun {
            return Err(ControlError::new("scripted tun-mode failure"));
        }
        Ok(())
    }

    fn is_elevated(&mut self) -> Result<bool, ControlError> {
        self.record("check_elevated");
        match self.elevation {
            ElevationScript::Elevated => Ok(true),
            ElevationScript::NotElevated => Ok(false),
            ElevationScript::CheckFails => Err(ControlError::new("scripted elevation failure")),
        }
    }

    fn relaunch_elevated(&mut self) -> Result<(), ControlError> {
        self.record("relaunch_elevated");
        if self.fail_relaunch {
            return Err(ControlError::new("scripted relaunch failure"));
        }
        Ok(())
    }

    fn toggle_ip_version(&mut self, prefer_ipv6: bool) -> Result<(), ControlError> {
        self.record(&format!("toggle_ip_version:{prefer_ipv6}"));
        Ok(())
    }

    fn proxies(&mut self) -> Result<Vec<ProxyEntry>, ControlError> {
        self.record("proxies");
        Ok(Vec::new())
    }

    fn latency(&mut self, proxy: &str, _probe_url: Option<&str>) -> Result<u64, ControlError> {
        self.record(&format!("latency:{proxy}"));
        if proxy == "unreachable" {
            return Err(ControlError::new("scripted probe failure"));
        }
        Ok(42)
    }

    fn rules(&mut self) -> Result<Vec<RouteRule>, ControlError> {
        self.record("rules");
        Ok(Vec::new())
    }

    fn active_config(&mut self) -> Result<String, ControlError> {
        self.record("active_config");
        Ok("{}".to_owned())
    }
}

#[derive(Default)]
struct TransportInner {
    sinks: HashMap<EventCategory, Sender<RawEvent>>,
    open_flags: HashMap<EventCategory, Arc<AtomicBool>>,
    subscribe_count: usize,
    close_count: usize,
    double_subscribe: bool,
}

/// Channel-backed [`EventTransport`] double; tests push events through it.
#[derive(Clone, Default)]
pub(crate) struct ChannelTransport {
    inner: Arc<Mutex<TransportInner>>,
}

impl ChannelTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Delivers one event to the open subscription for `category`.
    ///
    /// Returns whether anything accepted the event.
    pub(crate) fn emit(&self, category: EventCategory, payload: Value) -> bool {
        let inner = self.inner.lock().expect("transport poisoned");
        match inner.sinks.get(&category) {
            Some(sink) => sink.send(RawEvent::new(category, payload)).is_ok(),
            None => false,
        }
    }

    pub(crate) fn subscribe_count(&self) -> usize {
        self.inner.lock().expect("transport poisoned").subscribe_count
    }

    pub(crate) fn close_count(&self) -> usize {
        self.inner.lock().expect("transport poisoned").close_count
    }

    pub(crate) fn open_subscriptions(&self) -> usize {
        self.inner.lock().expect("transport poisoned").sinks.len()
    }

    /// Whether a category was ever subscribed twice without an intervening
    /// close — a violation of the hub's structural invariant.
    pub(crate) fn saw_double_subscribe(&self) -> bool {
        self.inner.lock().expect("transport poisoned").double_subscribe
    }
}

impl EventTransport for ChannelTransport {
    fn subscribe(
        &mut self,
        category: EventCategory,
        sink: Sender<RawEvent>,
    ) -> Result<Box<dyn EventSubscription>, TransportError> {
        let mut inner = self.inner.lock().expect("transport poisoned");
        inner.subscribe_count += 1;
        if let Some(flag) = inner.open_flags.get(&category)
            && !flag.load(Ordering::SeqCst)
        {
            inner.double_subscribe = true;
        }
        let closed = Arc::new(AtomicBool::new(false));
        inner.sinks.insert(category, sink);
        inner.open_flags.insert(category, Arc::clone(&closed));
        Ok(Box::new(TestSubscription {
            category,
            closed,
            transport: Arc::clone(&self.inner),
        }))
    }
}

struct TestSubscription {
    category: EventCategory,
    closed: Arc<AtomicBool>,
    transport: Arc<Mutex<TransportInner>>,
}

impl EventSubscription for TestSubscription {
    fn category(&self) -> EventCategory {
        self.category
    }

    fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.transport.lock().expect("transport poisoned");
        inner.close_count += 1;
        // Only drop the sink if this handle is still the registered one.
        if let Some(flag) = inner.open_flags.get(&self.category)
            && Arc::ptr_eq(flag, &self.closed)
        {
            inner.sinks.remove(&self.category);
        }
    }
}

/// Pacer that records pauses without sleeping.
#[derive(Debug, Clone, Default)]
pub(crate) struct CountingPacer {
    pauses: Arc<Mutex<Vec<u32>>>,
}

impl CountingPacer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pauses(&self) -> Vec<u32> {
        self.pauses.lock().expect("pacer poisoned").clone()
    }
}

impl StartupPacer for CountingPacer {
    fn pause(&self, attempt: u32) {
        self.pauses.lock().expect("pacer poisoned").push(attempt);
    }
}
