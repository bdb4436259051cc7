//! Supervisor bootstrap orchestration.
//!
//! Everything is constructed explicitly and injected at startup: no lazy
//! singletons, no global state beyond the tracing subscriber guard.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use bosun_config::{Config, PersistedFacts, PersistedFactsError};

use crate::report::StatusReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the supervisor configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns a pre-resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Builds a loader around the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Log initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The persisted facts could not be read.
    #[error("failed to restore persisted facts: {source}")]
    Persisted {
        /// Underlying persistence error.
        #[source]
        source: PersistedFactsError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Boot {
    config: Config,
    facts: PersistedFacts,
    telemetry: TelemetryHandle,
}

impl Boot {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the restored persisted facts.
    #[must_use]
    pub fn facts(&self) -> &PersistedFacts {
        &self.facts
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Bootstraps the supervisor using the supplied collaborators.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn StatusReporter>,
) -> Result<Boot, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let facts = match PersistedFacts::load(config.state_path()) {
        Ok(facts) => facts,
        Err(source) => {
            let error = BootstrapError::Persisted { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    reporter.bootstrap_succeeded(&config);
    Ok(Boot {
        config,
        facts,
        telemetry,
    })
}
