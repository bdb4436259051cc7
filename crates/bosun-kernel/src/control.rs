//! Abstractions over the kernel-control boundary.
//!
//! The supervisor never talks to the kernel directly; every request/response
//! operation goes through [`KernelControl`] so production code and tests can
//! swap the collaborator freely.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity advertised by a responsive kernel.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KernelIdentity {
    /// Kernel version string.
    pub version: String,
    /// Build tags compiled into the kernel, when advertised.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Source revision, when advertised.
    #[serde(default)]
    pub revision: Option<String>,
}

/// Version string recorded when the readiness poll never confirmed the kernel.
const PLACEHOLDER_VERSION: &str = "unknown";

impl KernelIdentity {
    /// Builds an identity with the given version and no build metadata.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            tags: Vec::new(),
            revision: None,
        }
    }

    /// Identity recorded for a degraded start.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_VERSION)
    }

    /// Whether this identity is the degraded-start placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.version == PLACEHOLDER_VERSION
    }
}

/// One selectable proxy entry reported by the kernel.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyEntry {
    /// Display name of the proxy or group.
    pub name: String,
    /// Kernel-reported proxy type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Currently selected member, for selector groups.
    #[serde(default)]
    pub now: Option<String>,
    /// Selectable members, for selector groups.
    #[serde(default)]
    pub all: Vec<String>,
    /// Whether the proxy supports UDP relaying.
    #[serde(default)]
    pub udp: bool,
}

/// One routing rule reported by the kernel.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteRule {
    /// Rule type (domain, ip-cidr, final, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Rule payload matched against traffic.
    pub payload: String,
    /// Proxy the rule routes to.
    pub proxy: String,
}

/// Errors reported by kernel-control implementations.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ControlError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ControlError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-friendly description without the optional source.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Behaviour required from concrete kernel-control bindings.
///
/// Implementations may block at each call; the supervisor funnels every
/// invocation through its owner thread, so calls never overlap.
pub trait KernelControl: Send {
    /// Launches the kernel worker process.
    fn start_kernel(&mut self) -> Result<(), ControlError>;

    /// Stops the kernel worker process.
    fn stop_kernel(&mut self) -> Result<(), ControlError>;

    /// Fetches the kernel's identity; used by the readiness poll.
    fn identity(&mut self) -> Result<KernelIdentity, ControlError>;

    /// Reconfigures the kernel for system-proxy mode.
    fn set_system_mode(&mut self) -> Result<(), ControlError>;

    /// Reconfigures the kernel for TUN mode.
    fn set_tun_mode(&mut self) -> Result<(), ControlError>;

    /// Whether the current process context holds elevated privileges.
    fn is_elevated(&mut self) -> Result<bool, ControlError>;

    /// Relaunches the current process context with elevated privileges.
    fn relaunch_elevated(&mut self) -> Result<(), ControlError>;

    /// Switches the kernel's DNS strategy between IPv4-only and IPv6-preferred.
    fn toggle_ip_version(&mut self, prefer_ipv6: bool) -> Result<(), ControlError>;

    /// Lists the kernel's proxies and selector groups.
    fn proxies(&mut self) -> Result<Vec<ProxyEntry>, ControlError>;

    /// Probes one proxy's latency in milliseconds.
    fn latency(&mut self, proxy: &str, probe_url: Option<&str>) -> Result<u64, ControlError>;

    /// Lists the kernel's routing rules.
    fn rules(&mut self) -> Result<Vec<RouteRule>, ControlError>;

    /// Returns the kernel's active configuration document.
    fn active_config(&mut self) -> Result<String, ControlError>;
}

impl fmt::Debug for dyn KernelControl {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("KernelControl")
    }
}
