//! Production collaborators for the kernel boundary.
//!
//! [`ProcessKernel`] drives the kernel as a child process plus its local
//! control API; [`WsEventTransport`] opens one websocket reader per
//! telemetry category. Both are injected at process startup — nothing in
//! the supervisor depends on these concrete types.

mod api;
mod config;
mod control_impl;
mod events_impl;
mod process;

pub use config::KernelLaunchPlan;
pub use control_impl::ProcessKernel;
pub use events_impl::WsEventTransport;
