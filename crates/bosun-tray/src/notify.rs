//! Single notification surface for user-initiated actions.
//!
//! Every initiated action resolves to exactly one visible outcome; there
//! is no silent-failure path. Where these notices end up rendering is an
//! external concern behind [`NoticeSink`].

use strum::Display;
use tracing::{error, info, warn};

const NOTIFY_TARGET: &str = "bosun_tray::notify";

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    /// The action completed.
    Success,
    /// Neutral progress information.
    Info,
    /// The action completed with caveats.
    Warning,
    /// The action failed.
    Error,
}

/// One user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity the surface should render with.
    pub severity: Severity,
    /// Notice text.
    pub text: String,
}

impl Notice {
    /// Builds a notice.
    #[must_use]
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

/// Behaviour required from concrete notification surfaces.
pub trait NoticeSink: Send {
    /// Shows one notice to the user.
    fn notify(&self, notice: Notice);

    /// Shows a success notice.
    fn success(&self, text: impl Into<String>)
    where
        Self: Sized,
    {
        self.notify(Notice::new(Severity::Success, text));
    }

    /// Shows an informational notice.
    fn info(&self, text: impl Into<String>)
    where
        Self: Sized,
    {
        self.notify(Notice::new(Severity::Info, text));
    }

    /// Shows a warning notice.
    fn warning(&self, text: impl Into<String>)
    where
        Self: Sized,
    {
        self.notify(Notice::new(Severity::Warning, text));
    }

    /// Shows an error notice.
    fn error(&self, text: impl Into<String>)
    where
        Self: Sized,
    {
        self.notify(Notice::new(Severity::Error, text));
    }
}

/// Sink that records notices in the structured log.
///
/// Used headless and as the default until a rendering surface registers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNoticeSink;

impl TracingNoticeSink {
    /// Builds a new sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl NoticeSink for TracingNoticeSink {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Success | Severity::Info => {
                info!(
                    target: NOTIFY_TARGET,
                    severity = %notice.severity,
                    "{}",
                    notice.text
                );
            }
            Severity::Warning => {
                warn!(
                    target: NOTIFY_TARGET,
                    severity = %notice.severity,
                    "{}",
                    notice.text
                );
            }
            Severity::Error => {
                error!(
                    target: NOTIFY_TARGET,
                    severity = %notice.severity,
                    "{}",
                    notice.text
                );
            }
        }
    }
}
