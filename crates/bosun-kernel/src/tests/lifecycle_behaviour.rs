//! Behavioural tests for lifecycle start/stop/restart semantics.

use rstest::rstest;
use serde_json::json;

use super::support::{
    ChannelTransport, CountingPacer, ScriptedKernel, read_calls, wait_until,
};
use crate::control::KernelIdentity;
use crate::errors::LifecycleError;
use crate::events::EventCategory;
use crate::lifecycle::{READINESS_ATTEMPTS, StartOutcome, Supervisor};
use crate::notify::StatusEvent;

fn supervisor_with(
    kernel: ScriptedKernel,
    transport: &ChannelTransport,
    pacer: &CountingPacer,
) -> Supervisor {
    Supervisor::new(
        Box::new(kernel),
        Box::new(transport.clone()),
        Box::new(pacer.clone()),
    )
}

#[rstest]
fn start_confirms_identity_and_opens_subscriptions() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let kernel = ScriptedKernel::new();
    let calls = kernel.call_log();
    let mut supervisor = supervisor_with(kernel, &transport, &pacer);

    let outcome = supervisor.start().expect("start should succeed");

    assert_eq!(
        outcome,
        StartOutcome::Confirmed {
            identity: KernelIdentity::new("1.9.0")
        }
    );
    assert!(supervisor.state().running);
    assert_eq!(supervisor.identity().map(|id| id.version.as_str()), Some("1.9.0"));
    assert_eq!(transport.open_subscriptions(), 4);
    assert!(pacer.pauses().is_empty());
    assert_eq!(read_calls(&calls), vec!["start", "identity"]);
}

#[rstest]
fn start_failure_is_fatal_without_retry() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let kernel = ScriptedKernel::new().failing_start();
    let calls = kernel.call_log();
    let mut supervisor = supervisor_with(kernel, &transport, &pacer);

    let error = supervisor.start().expect_err("start should fail");

    assert!(matches!(error, LifecycleError::Start { .. }));
    assert!(!supervisor.state().running);
    assert_eq!(transport.open_subscriptions(), 0);
    // The retry budget applies to readiness probes, never the start command.
    assert_eq!(read_calls(&calls), vec!["start"]);
}

#[rstest]
fn exhausted_readiness_budget_degrades_instead_of_blocking() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let kernel = ScriptedKernel::new().identity_failures(READINESS_ATTEMPTS as usize);
    let calls = kernel.call_log();
    let mut supervisor = supervisor_with(kernel, &transport, &pacer);

    let outcome = supervisor.start().expect("degraded start is a success");

    assert!(outcome.is_degraded());
    assert!(supervisor.state().running);
    assert!(
        supervisor
            .identity()
            .is_some_and(KernelIdentity::is_placeholder)
    );
    // Five probes with a pause between consecutive attempts.
    let identity_probes = read_calls(&calls)
        .iter()
        .filter(|call| call.as_str() == "identity")
        .count();
    assert_eq!(identity_probes, READINESS_ATTEMPTS as usize);
    assert_eq!(pacer.pauses(), vec![1, 2, 3, 4]);
    // Telemetry subscriptions are open and receiving despite degradation.
    assert_eq!(transport.open_subscriptions(), 4);
    assert!(transport.emit(EventCategory::Traffic, json!({ "up": 9, "down": 3 })));
    assert!(wait_until(|| supervisor.telemetry().traffic.total_up == 9));
}

#[rstest]
fn readiness_recovers_midway_through_the_budget() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let kernel = ScriptedKernel::new().identity_failures(2);
    let mut supervisor = supervisor_with(kernel, &transport, &pacer);

    let outcome = supervisor.start().expect("start should succeed");

    assert!(!outcome.is_degraded());
    assert_eq!(pacer.pauses(), vec![1, 2]);
}

#[rstest]
fn stop_cleans_up_even_when_the_boundary_call_fails() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let kernel = ScriptedKernel::new().failing_stop();
    let mut supervisor = supervisor_with(kernel, &transport, &pacer);

    supervisor.start().expect("start should succeed");
    assert!(transport.emit(EventCategory::Traffic, json!({ "up": 5, "down": 5 })));
    assert!(wait_until(|| supervisor.telemetry().traffic.total_up == 5));

    let error = supervisor.stop().expect_err("stop should report the failure");

    assert!(matches!(error, LifecycleError::Stop { .. }));
    assert!(!supervisor.state().running);
    assert_eq!(supervisor.state().uptime_seconds, 0);
    assert!(supervisor.identity().is_none());
    let telemetry = supervisor.telemetry();
    assert_eq!(telemetry.traffic.total_up, 0);
    assert!(telemetry.connections.is_empty());
    assert!(telemetry.logs.is_empty());
    // The transport saw every handle released.
    assert_eq!(transport.close_count(), 4);
}

#[rstest]
fn events_after_stop_are_discarded() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let mut supervisor = supervisor_with(ScriptedKernel::new(), &transport, &pacer);

    supervisor.start().expect("start should succeed");
    supervisor.stop().expect("stop should succeed");

    assert!(!transport.emit(EventCategory::Traffic, json!({ "up": 1, "down": 1 })));
    assert_eq!(supervisor.telemetry().traffic.total_up, 0);
}

#[rstest]
fn restart_proceeds_past_a_stop_failure() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let kernel = ScriptedKernel::new().failing_stop();
    let calls = kernel.call_log();
    let mut supervisor = supervisor_with(kernel, &transport, &pacer);

    supervisor.start().expect("start should succeed");
    let outcome = supervisor.restart().expect("restart should succeed");

    assert!(!outcome.is_degraded());
    assert!(supervisor.state().running);
    assert_eq!(
        read_calls(&calls),
        vec!["start", "identity", "stop", "start", "identity"]
    );
}

#[rstest]
fn running_changes_are_published_only_on_flips() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let mut supervisor = supervisor_with(ScriptedKernel::new(), &transport, &pacer);
    let events = supervisor.subscribe();

    supervisor.start().expect("start should succeed");
    supervisor.stop().expect("stop should succeed");
    // Stopping an already stopped kernel flips nothing.
    supervisor.stop().expect("second stop should succeed");

    let received: Vec<StatusEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            StatusEvent::RunningChanged { running: true },
            StatusEvent::RunningChanged { running: false },
        ]
    );
}

#[rstest]
fn running_tracks_the_last_completed_call() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let mut supervisor = supervisor_with(ScriptedKernel::new(), &transport, &pacer);

    assert!(!supervisor.state().running);
    supervisor.start().expect("start");
    assert!(supervisor.state().running);
    supervisor.restart().expect("restart");
    assert!(supervisor.state().running);
    supervisor.stop().expect("stop");
    assert!(!supervisor.state().running);
    supervisor.start().expect("start again");
    assert!(supervisor.state().running);
}

#[rstest]
fn start_resets_counters_before_subscriptions_open() {
    let transport = ChannelTransport::new();
    let pacer = CountingPacer::new();
    let mut supervisor = supervisor_with(ScriptedKernel::new(), &transport, &pacer);

    supervisor.start().expect("start should succeed");
    assert!(transport.emit(EventCategory::Traffic, json!({ "up": 50, "down": 50 })));
    assert!(wait_until(|| supervisor.telemetry().traffic.total_up == 50));

    supervisor.restart().expect("restart should succeed");

    // No stale counters survive into the new readiness window.
    assert!(wait_until(|| supervisor.telemetry().traffic.total_up == 0));
}
