//! Facts that survive a supervisor restart.
//!
//! The supervisor records the last proxy mode, whether the kernel was
//! intentionally running, and window bookkeeping so an elevated relaunch
//! (or an ordinary restart) resumes where the previous process left off.
//! The file is read once at startup and rewritten on every change; its
//! contents are opaque to everything but this module.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mode::ProxyMode;

/// Supervisor facts persisted across process restarts.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersistedFacts {
    /// Proxy mode active when the facts were last written.
    pub last_mode: ProxyMode,
    /// Whether the kernel was intentionally running.
    pub kernel_running: bool,
    /// Whether the main window was visible.
    pub window_visible: bool,
    /// Route shown before the window was last hidden.
    pub last_route: String,
}

/// Errors raised while loading or storing persisted facts.
#[derive(Debug, Error)]
pub enum PersistedFactsError {
    /// Reading the facts file failed.
    #[error("failed to read persisted facts '{path}': {source}")]
    Read {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The facts file held malformed JSON.
    #[error("persisted facts '{path}' are malformed: {source}")]
    Malformed {
        /// File that could not be parsed.
        path: Utf8PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// Writing the facts file failed.
    #[error("failed to write persisted facts '{path}': {source}")]
    Write {
        /// File that could not be written.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the facts failed.
    #[error("failed to serialise persisted facts: {source}")]
    Serialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
}

impl PersistedFacts {
    /// Loads facts from `path`, falling back to defaults when absent.
    pub fn load(path: &Utf8Path) -> Result<Self, PersistedFactsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(PersistedFactsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| PersistedFactsError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the facts to `path`, creating parent directories on demand.
    pub fn store(&self, path: &Utf8Path) -> Result<(), PersistedFactsError> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| PersistedFactsError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| PersistedFactsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn facts_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("state.json"))
            .unwrap_or_else(|_| panic!("temp dir path should be UTF-8"))
    }

    #[rstest]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let facts = PersistedFacts::load(&facts_path(&dir)).expect("load should succeed");
        assert_eq!(facts, PersistedFacts::default());
    }

    #[rstest]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = facts_path(&dir);
        let facts = PersistedFacts {
            last_mode: ProxyMode::Tun,
            kernel_running: true,
            window_visible: false,
            last_route: "/connections".to_owned(),
        };
        facts.store(&path).expect("store should succeed");
        let reloaded = PersistedFacts::load(&path).expect("load should succeed");
        assert_eq!(reloaded, facts);
    }

    #[rstest]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = facts_path(&dir);
        fs::write(&path, "{not json").expect("write fixture");
        let error = PersistedFacts::load(&path).expect_err("load should fail");
        assert!(matches!(error, PersistedFactsError::Malformed { .. }));
    }
}
