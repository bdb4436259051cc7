//! Push-event boundary: categories, raw payloads, and subscription handles.
//!
//! The transport delivers opaque JSON payloads tagged with their category;
//! validation happens when the payload is applied to the telemetry
//! snapshot, never inside the transport. Each open subscription is an
//! explicit handle supporting [`EventSubscription::close`], so releasing
//! every stream is a structural guarantee rather than caller discipline.

use std::error::Error;
use std::fmt;
use std::sync::mpsc;

use serde_json::Value;
use strum::{Display, EnumString};
use thiserror::Error;

/// Telemetry categories pushed by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EventCategory {
    /// Instantaneous upload/download rates.
    Traffic,
    /// Kernel memory usage.
    Memory,
    /// Kernel log lines.
    Log,
    /// Active connection table.
    Connections,
}

impl EventCategory {
    /// Every category, in subscription order.
    pub const ALL: [Self; 4] = [Self::Traffic, Self::Memory, Self::Log, Self::Connections];
}

/// One event as delivered by the transport, prior to validation.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Category of the stream that produced the payload.
    pub category: EventCategory,
    /// Opaque payload; validated on application.
    pub payload: Value,
}

impl RawEvent {
    /// Builds a raw event.
    #[must_use]
    pub fn new(category: EventCategory, payload: Value) -> Self {
        Self { category, payload }
    }
}

/// Errors reported by event-transport implementations.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl TransportError {
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

/// An open push-event stream.
///
/// Dropping a handle without calling [`close`](Self::close) is allowed but
/// discouraged; the hub always closes handles explicitly so no delivery
/// thread outlives its subscription.
pub trait EventSubscription: Send {
    /// Category this subscription delivers.
    fn category(&self) -> EventCategory;

    /// Releases the stream; must be safe to call more than once.
    fn close(&mut self);
}

/// Behaviour required from concrete push-event transports.
pub trait EventTransport: Send {
    /// Opens a stream for `category`, delivering payloads into `sink`.
    ///
    /// Delivery order within the category must match arrival order. The
    /// transport stops delivering once the returned handle is closed or the
    /// sink is disconnected.
    fn subscribe(
        &mut self,
        category: EventCategory,
        sink: mpsc::Sender<RawEvent>,
    ) -> Result<Box<dyn EventSubscription>, TransportError>;
}

impl fmt::Debug for dyn EventTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("EventTransport")
    }
}
