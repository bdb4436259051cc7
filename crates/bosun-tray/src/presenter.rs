//! Rendering boundary for the derived tray model.

use std::error::Error;
use std::fmt;

use thiserror::Error;

use crate::model::TrayModel;

/// Errors reported by tray presenter implementations.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PresenterError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl PresenterError {
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

/// Behaviour required from concrete tray renderers.
///
/// Rendering itself is an external concern; implementations typically wrap
/// a desktop tray handle. Both operations replace the displayed menu and
/// tooltip wholesale.
pub trait TrayPresenter: Send {
    /// Installs a freshly derived model on the existing presentation handle.
    fn apply(&mut self, model: &TrayModel) -> Result<(), PresenterError>;

    /// Tears the presentation handle down and recreates it with `model`.
    ///
    /// Last-resort recovery for a failed [`apply`](Self::apply); never part
    /// of the normal refresh path.
    fn rebuild(&mut self, model: &TrayModel) -> Result<(), PresenterError>;
}

impl fmt::Debug for dyn TrayPresenter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("TrayPresenter")
    }
}
