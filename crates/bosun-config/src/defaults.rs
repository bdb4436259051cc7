//! Compiled defaults shared by the configuration layers.

use camino::Utf8PathBuf;
use std::env;

/// Default host of the kernel's control API.
pub const DEFAULT_API_HOST: &str = "127.0.0.1";

/// Default port of the kernel's control API.
pub const DEFAULT_API_PORT: u16 = 12081;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default release feed consulted by the update checker.
pub const DEFAULT_RELEASE_FEED: &str =
    "https://api.github.com/repos/bosun-proxy/bosun/releases/latest";

pub(crate) fn default_api_host() -> String {
    DEFAULT_API_HOST.to_owned()
}

pub(crate) const fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

pub(crate) fn default_release_feed() -> url::Url {
    // The literal is compile-time constant and well-formed.
    url::Url::parse(DEFAULT_RELEASE_FEED)
        .unwrap_or_else(|_| unreachable!("default release feed is a valid URL"))
}

/// Computes the default directory holding the kernel executable.
#[must_use]
pub fn default_kernel_dir() -> Utf8PathBuf {
    base_data_directory().join("kernel")
}

/// Computes the default location of the persisted supervisor facts.
#[must_use]
pub fn default_state_path() -> Utf8PathBuf {
    base_data_directory().join("state.json")
}

#[cfg(unix)]
fn base_data_directory() -> Utf8PathBuf {
    let base = dirs::data_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory);
    base.join("bosun")
}

#[cfg(not(unix))]
fn base_data_directory() -> Utf8PathBuf {
    fallback_base_directory().join("bosun")
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
