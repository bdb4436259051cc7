//! Derived tray state for the bosun supervisor.
//!
//! The tray model is never mutated in place: it is a pure function of the
//! observed facts, rebuilt wholesale on every relevant change and handed to
//! the rendering boundary ([`TrayPresenter`]). The [`ResyncController`]
//! coalesces bursts of fact changes into single regenerations and falls
//! back to a full presenter rebuild when an incremental apply fails.

mod model;
mod notify;
mod presenter;
mod resync;

pub use model::{MenuAction, MenuActionId, MenuEntry, TrayFacts, TrayModel};
pub use notify::{Notice, NoticeSink, Severity, TracingNoticeSink};
pub use presenter::{PresenterError, TrayPresenter};
pub use resync::ResyncController;
