//! Shared configuration for the bosun supervisor and its binaries.
//!
//! Resolution is layered: compiled defaults, then a configuration file,
//! then `BOSUN_`-prefixed environment variables, then command-line flags,
//! with later layers winning. The supervisor and the tray front end load
//! the same [`Config`] so both agree on kernel paths, the control API
//! endpoint, and where persisted facts live.

mod defaults;
mod endpoint;
mod logging;
mod mode;
mod persisted;

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_API_HOST, DEFAULT_API_PORT, DEFAULT_LOG_FILTER, default_kernel_dir, default_state_path,
};
pub use endpoint::{ApiEndpoint, EndpointError};
pub use logging::{LogFormat, LogFormatParseError};
pub use mode::{ProxyMode, ProxyModeParseError};
pub use persisted::{PersistedFacts, PersistedFactsError};

/// File name of the kernel executable inside the kernel directory.
pub const KERNEL_BINARY_NAME: &str = "sing-box";

/// File name of the kernel's routing configuration document.
pub const KERNEL_CONFIG_NAME: &str = "config.json";

/// Resolved configuration shared by the supervisor binaries.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, OrthoConfig)]
#[ortho_config(prefix = "BOSUN_")]
pub struct Config {
    /// Directory holding the kernel executable and its configuration.
    #[serde(default = "defaults::default_kernel_dir")]
    pub kernel_dir: Utf8PathBuf,
    /// Host of the kernel's control API.
    #[serde(default = "defaults::default_api_host")]
    pub api_host: String,
    /// Port of the kernel's control API.
    #[serde(default = "defaults::default_api_port")]
    pub api_port: u16,
    /// Token appended to control API and event-stream requests.
    #[serde(default)]
    pub api_token: String,
    /// Log filter expression consumed by the tracing subscriber.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for structured logs.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Location of the persisted supervisor facts.
    #[serde(default = "defaults::default_state_path")]
    pub state_path: Utf8PathBuf,
    /// Release feed consulted by the update checker.
    #[serde(default = "defaults::default_release_feed")]
    pub release_feed: url::Url,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kernel_dir: defaults::default_kernel_dir(),
            api_host: defaults::default_api_host(),
            api_port: defaults::default_api_port(),
            api_token: String::new(),
            log_filter: defaults::default_log_filter_string(),
            log_format: LogFormat::default(),
            state_path: defaults::default_state_path(),
            release_feed: defaults::default_release_feed(),
        }
    }
}

impl Config {
    /// Loads the configuration from the standard layered sources.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Path to the kernel executable.
    #[must_use]
    pub fn kernel_binary(&self) -> Utf8PathBuf {
        self.kernel_dir.join(KERNEL_BINARY_NAME)
    }

    /// Path to the kernel's routing configuration document.
    #[must_use]
    pub fn kernel_config_path(&self) -> Utf8PathBuf {
        self.kernel_dir.join(KERNEL_CONFIG_NAME)
    }

    /// Directory holding the kernel executable and its configuration.
    #[must_use]
    pub fn kernel_dir(&self) -> &Utf8Path {
        self.kernel_dir.as_path()
    }

    /// Control API endpoint assembled from host, port, and token.
    #[must_use]
    pub fn api_endpoint(&self) -> ApiEndpoint {
        ApiEndpoint::new(self.api_host.clone(), self.api_port, self.api_token.clone())
    }

    /// Log filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Selected log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Location of the persisted supervisor facts.
    #[must_use]
    pub fn state_path(&self) -> &Utf8Path {
        self.state_path.as_path()
    }

    /// Release feed consulted by the update checker.
    #[must_use]
    pub fn release_feed(&self) -> &url::Url {
        &self.release_feed
    }
}
