//! [`KernelControl`] implementation driving a kernel child process.

use std::env;
use std::fs;
use std::process::Command;
use std::sync::Mutex;

use bosun_config::Config;
use nix::unistd::geteuid;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::api::ApiClient;
use super::config::KernelLaunchPlan;
use super::process::{
    KernelProcessState, check_kernel_config, spawn_kernel, terminate_child, version_output,
};
use crate::control::{ControlError, KernelControl, KernelIdentity, ProxyEntry, RouteRule};

const CONTROL_TARGET: &str = "bosun_kernel::adapter";

/// Inbound tag used for the plain mixed listener.
const MIXED_INBOUND_TAG: &str = "mixed-in";

/// Inbound tag used for the TUN listener.
const TUN_INBOUND_TAG: &str = "tun-in";

/// Listen port for the local mixed inbound.
const MIXED_LISTEN_PORT: u16 = 12080;

/// Drives the kernel through its child process and local control API.
pub struct ProcessKernel {
    plan: KernelLaunchPlan,
    api: ApiClient,
    state: Mutex<KernelProcessState>,
}

impl ProcessKernel {
    /// Builds the production kernel binding from the resolved configuration.
    pub fn from_config(config: &Config) -> Result<Self, ControlError> {
        Ok(Self {
            plan: KernelLaunchPlan::from_config(config),
            api: ApiClient::new(config.api_endpoint())?,
            state: Mutex::new(KernelProcessState::NotStarted),
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, KernelProcessState> {
        // Recover from poisoning so shutdown still reaches the child.
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn read_kernel_config(&self) -> Result<Value, ControlError> {
        let content = fs::read_to_string(self.plan.config_path()).map_err(|error| {
            ControlError::with_source(
                format!("failed to read kernel config '{}'", self.plan.config_path()),
                error,
            )
        })?;
        serde_json::from_str(&content).map_err(|error| {
            ControlError::with_source(
                format!("kernel config '{}' is not valid JSON", self.plan.config_path()),
                error,
            )
        })
    }

    fn write_kernel_config(&self, document: &Value) -> Result<(), ControlError> {
        let content = serde_json::to_string_pretty(document)
            .map_err(|error| ControlError::with_source("failed to serialise kernel config", error))?;
        fs::write(self.plan.config_path(), content).map_err(|error| {
            ControlError::with_source(
                format!("failed to write kernel config '{}'", self.plan.config_path()),
                error,
            )
        })
    }

    fn replace_inbounds(&self, inbounds: Value) -> Result<(), ControlError> {
        let mut document = self.read_kernel_config()?;
        let Some(root) = document.as_object_mut() else {
            return Err(ControlError::new("kernel config root is not an object"));
        };
        root.insert("inbounds".to_owned(), inbounds);
        self.write_kernel_config(&document)
    }

    /// Parses `<binary> version` output into an identity.
    ///
    /// The first line carries `<name> version <semver>`; later lines may
    /// add `Tags:` and `Revision:` fields.
    fn identity_from_output(output: &str) -> Option<KernelIdentity> {
        let mut identity: Option<KernelIdentity> = None;
        for line in output.lines() {
            let line = line.trim();
            if identity.is_none()
                && let Some(version) = line.split(" version ").nth(1)
            {
                identity = Some(KernelIdentity::new(version.trim()));
                continue;
            }
            let Some(current) = identity.as_mut() else {
                continue;
            };
            if let Some(tags) = line.strip_prefix("Tags:") {
                current.tags = tags.split(',').map(|tag| tag.trim().to_owned()).collect();
            } else if let Some(revision) = line.strip_prefix("Revision:") {
                current.revision = Some(revision.trim().to_owned());
            }
        }
        identity
    }
}

impl KernelControl for ProcessKernel {
    fn start_kernel(&mut self) -> Result<(), ControlError> {
        {
            let mut state = self.lock_state();
            if let KernelProcessState::Running { child } = &mut *state {
                // A previous instance is still ours to reap before relaunching.
                warn!(
                    target: CONTROL_TARGET,
                    pid = child.id(),
                    "kernel already running; stopping the previous instance first"
                );
                terminate_child(child);
                *state = KernelProcessState::Stopped;
            }
        }

        check_kernel_config(&self.plan)?;
        let child = spawn_kernel(&self.plan)?;
        info!(target: CONTROL_TARGET, pid = child.id(), "kernel started");
        *self.lock_state() = KernelProcessState::Running { child };
        Ok(())
    }

    fn stop_kernel(&mut self) -> Result<(), ControlError> {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, KernelProcessState::Stopped) {
            KernelProcessState::Running { mut child } => {
                terminate_child(&mut child);
                info!(target: CONTROL_TARGET, "kernel stopped");
                Ok(())
            }
            KernelProcessState::NotStarted | KernelProcessState::Stopped => Ok(()),
        }
    }

    fn identity(&mut self) -> Result<KernelIdentity, ControlError> {
        match self.api.version() {
            Ok(identity) => Ok(identity),
            Err(api_error) => {
                debug!(
                    target: CONTROL_TARGET,
                    error = %api_error,
                    "control API version query failed; falling back to binary output"
                );
                let output = version_output(&self.plan)?;
                Self::identity_from_output(&output)
                    .ok_or_else(|| ControlError::new("unrecognised kernel version output"))
            }
        }
    }

    fn set_system_mode(&mut self) -> Result<(), ControlError> {
        self.replace_inbounds(json!([
            {
                "type": "mixed",
                "tag": MIXED_INBOUND_TAG,
                "listen": "127.0.0.1",
                "listen_port": MIXED_LISTEN_PORT,
                "set_system_proxy": true
            }
        ]))?;
        info!(target: CONTROL_TARGET, "kernel config set to system-proxy inbounds");
        Ok(())
    }

    fn set_tun_mode(&mut self) -> Result<(), ControlError> {
        self.replace_inbounds(json!([
            {
                "type": "mixed",
                "tag": MIXED_INBOUND_TAG,
                "listen": "127.0.0.1",
                "listen_port": MIXED_LISTEN_PORT
            },
            {
                "type": "tun",
                "tag": TUN_INBOUND_TAG,
                "address": ["172.18.0.1/30", "fdfe:dcba:9876::1/126"],
                "auto_route": true,
                "strict_route": true,
                "stack": "mixed"
            }
        ]))?;
        info!(target: CONTROL_TARGET, "kernel config set to TUN inbounds");
        Ok(())
    }

    fn is_elevated(&mut self) -> Result<bool, ControlError> {
        Ok(geteuid().is_root())
    }

    fn relaunch_elevated(&mut self) -> Result<(), ControlError> {
        let current_exe = env::current_exe()
            .map_err(|error| ControlError::with_source("failed to locate current executable", error))?;
        Command::new("pkexec")
            .arg(&current_exe)
            .spawn()
            .map(|_| ())
            .map_err(|error| {
                ControlError::with_source("failed to relaunch with elevated privileges", error)
            })
    }

    fn toggle_ip_version(&mut self, prefer_ipv6: bool) -> Result<(), ControlError> {
        let content = fs::read_to_string(self.plan.config_path()).map_err(|error| {
            ControlError::with_source(
                format!("failed to read kernel config '{}'", self.plan.config_path()),
                error,
            )
        })?;

        let modified = if prefer_ipv6 {
            content.replace("\"ipv4_only\"", "\"prefer_ipv6\"")
        } else {
            content.replace("\"prefer_ipv6\"", "\"ipv4_only\"")
        };

        // The textual edit must still parse before it is persisted.
        serde_json::from_str::<Value>(&modified).map_err(|error| {
            ControlError::with_source("IP-version rewrite produced invalid JSON", error)
        })?;
        fs::write(self.plan.config_path(), modified).map_err(|error| {
            ControlError::with_source(
                format!("failed to write kernel config '{}'", self.plan.config_path()),
                error,
            )
        })?;
        info!(
            target: CONTROL_TARGET,
            prefer_ipv6,
            "kernel DNS strategy switched"
        );
        Ok(())
    }

    fn proxies(&mut self) -> Result<Vec<ProxyEntry>, ControlError> {
        self.api.proxies()
    }

    fn latency(&mut self, proxy: &str, probe_url: Option<&str>) -> Result<u64, ControlError> {
        self.api.latency(proxy, probe_url)
    }

    fn rules(&mut self) -> Result<Vec<RouteRule>, ControlError> {
        self.api.rules()
    }

    fn active_config(&mut self) -> Result<String, ControlError> {
        fs::read_to_string(self.plan.config_path()).map_err(|error| {
            ControlError::with_source(
                format!("failed to read kernel config '{}'", self.plan.config_path()),
                error,
            )
        })
    }
}

impl Drop for ProcessKernel {
    fn drop(&mut self) {
        let mut state = self.lock_state();
        if let KernelProcessState::Running { mut child } =
            std::mem::replace(&mut *state, KernelProcessState::Stopped)
        {
            terminate_child(&mut child);
        }
    }
}

impl std::fmt::Debug for ProcessKernel {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ProcessKernel")
            .field("plan", &self.plan)
            .finish()
    }
}
