//! Launch-time facts for the kernel child process.

use bosun_config::Config;
use camino::{Utf8Path, Utf8PathBuf};

/// Paths the adapter needs to launch and reconfigure the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelLaunchPlan {
    binary: Utf8PathBuf,
    work_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl KernelLaunchPlan {
    /// Derives the plan from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.kernel_binary(),
            work_dir: config.kernel_dir().to_path_buf(),
            config_path: config.kernel_config_path(),
        }
    }

    /// Builds a plan from explicit paths.
    #[must_use]
    pub fn new(
        binary: impl Into<Utf8PathBuf>,
        work_dir: impl Into<Utf8PathBuf>,
        config_path: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
            config_path: config_path.into(),
        }
    }

    /// Path to the kernel executable.
    #[must_use]
    pub fn binary(&self) -> &Utf8Path {
        self.binary.as_path()
    }

    /// Working directory handed to the kernel.
    #[must_use]
    pub fn work_dir(&self) -> &Utf8Path {
        self.work_dir.as_path()
    }

    /// Path to the kernel's routing configuration document.
    #[must_use]
    pub fn config_path(&self) -> &Utf8Path {
        self.config_path.as_path()
    }
}
