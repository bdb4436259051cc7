//! Proxy roster queries and latency probing.

use tracing::debug;

use crate::control::{ControlError, ProxyEntry, RouteRule};
use crate::lifecycle::Supervisor;
use crate::notify::StatusEvent;

const ROSTER_TARGET: &str = "bosun_kernel::roster";

impl Supervisor {
    /// Lists the kernel's proxies and selector groups.
    pub fn proxies(&mut self) -> Result<Vec<ProxyEntry>, ControlError> {
        self.control_mut().proxies()
    }

    /// Lists the kernel's routing rules.
    pub fn rules(&mut self) -> Result<Vec<RouteRule>, ControlError> {
        self.control_mut().rules()
    }

    /// Returns the kernel's active configuration document.
    pub fn active_config(&mut self) -> Result<String, ControlError> {
        self.control_mut().active_config()
    }

    /// Switches the kernel's DNS strategy between IPv4-only and
    /// IPv6-preferred.
    pub fn toggle_ip_version(&mut self, prefer_ipv6: bool) -> Result<(), ControlError> {
        self.control_mut().toggle_ip_version(prefer_ipv6)
    }

    /// Probes one proxy's latency in milliseconds.
    pub fn latency(
        &mut self,
        proxy: &str,
        probe_url: Option<&str>,
    ) -> Result<u64, ControlError> {
        self.control_mut().latency(proxy, probe_url)
    }

    /// Probes a batch of proxies sequentially, broadcasting one
    /// [`StatusEvent::LatencyReport`] per proxy.
    ///
    /// A failed probe is reported with `delay_ms: None` and never aborts
    /// the sweep.
    pub fn latency_sweep(
        &mut self,
        proxies: &[String],
        probe_url: Option<&str>,
    ) -> Vec<(String, Option<u64>)> {
        let mut reports = Vec::with_capacity(proxies.len());
        for proxy in proxies {
            let delay_ms = match self.control_mut().latency(proxy, probe_url) {
                Ok(delay) => Some(delay),
                Err(error) => {
                    debug!(
                        target: ROSTER_TARGET,
                        proxy = %proxy,
                        error = %error,
                        "latency probe failed"
                    );
                    None
                }
            };
            self.broadcast_mut().publish(&StatusEvent::LatencyReport {
                proxy: proxy.clone(),
                delay_ms,
            });
            reports.push((proxy.clone(), delay_ms));
        }
        reports
    }
}
