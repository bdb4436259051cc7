//! Behavioural tests for roster queries and latency sweeps.

use rstest::rstest;

use super::support::{ChannelTransport, CountingPacer, ScriptedKernel, read_calls};
use crate::lifecycle::Supervisor;
use crate::notify::StatusEvent;

fn supervisor_with(kernel: ScriptedKernel, transport: &ChannelTransport) -> Supervisor {
    Supervisor::new(
        Box::new(kernel),
        Box::new(transport.clone()),
        Box::new(CountingPacer::new()),
    )
}

#[rstest]
fn sweep_probes_every_proxy_and_reports_each() {
    let transport = ChannelTransport::new();
    let kernel = ScriptedKernel::new();
    let calls = kernel.call_log();
    let mut supervisor = supervisor_with(kernel, &transport);
    let events = supervisor.subscribe();

    let proxies = vec![
        "alpha".to_owned(),
        "unreachable".to_owned(),
        "beta".to_owned(),
    ];
    let reports = supervisor.latency_sweep(&proxies, None);

    // A failed probe never aborts the sweep.
    assert_eq!(
        reports,
        vec![
            ("alpha".to_owned(), Some(42)),
            ("unreachable".to_owned(), None),
            ("beta".to_owned(), Some(42)),
        ]
    );
    assert_eq!(
        read_calls(&calls),
        vec!["latency:alpha", "latency:unreachable", "latency:beta"]
    );
    let broadcast: Vec<StatusEvent> = events.try_iter().collect();
    assert_eq!(
        broadcast,
        vec![
            StatusEvent::LatencyReport {
                proxy: "alpha".to_owned(),
                delay_ms: Some(42),
            },
            StatusEvent::LatencyReport {
                proxy: "unreachable".to_owned(),
                delay_ms: None,
            },
            StatusEvent::LatencyReport {
                proxy: "beta".to_owned(),
                delay_ms: Some(42),
            },
        ]
    );
}

#[rstest]
fn roster_queries_pass_straight_through() {
    let transport = ChannelTransport::new();
    let kernel = ScriptedKernel::new();
    let calls = kernel.call_log();
    let mut supervisor = supervisor_with(kernel, &transport);

    supervisor.proxies().expect("proxies should succeed");
    supervisor.rules().expect("rules should succeed");
    supervisor
        .active_config()
        .expect("active config should succeed");
    supervisor
        .toggle_ip_version(true)
        .expect("toggle should succeed");

    assert_eq!(
        read_calls(&calls),
        vec!["proxies", "rules", "active_config", "toggle_ip_version:true"]
    );
}
