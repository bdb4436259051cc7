//! Websocket-backed push-event transport.
//!
//! The kernel exposes one stream per telemetry category on its control
//! endpoint. Each subscription owns a blocking reader thread; closing the
//! subscription shuts the underlying TCP stream down so the reader
//! unblocks, then joins it.

use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use bosun_config::ApiEndpoint;
use serde_json::Value;
use tracing::{debug, warn};
use tungstenite::Message;
use tungstenite::client::client;

use crate::events::{
    EventCategory, EventSubscription, EventTransport, RawEvent, TransportError,
};

const TRANSPORT_TARGET: &str = "bosun_kernel::adapter";

/// Connects to the kernel's per-category websocket streams.
#[derive(Debug, Clone)]
pub struct WsEventTransport {
    endpoint: ApiEndpoint,
}

impl WsEventTransport {
    /// Builds a transport against the supplied control endpoint.
    #[must_use]
    pub fn new(endpoint: ApiEndpoint) -> Self {
        Self { endpoint }
    }

    fn stream_path(category: EventCategory) -> &'static str {
        match category {
            EventCategory::Traffic => "/traffic",
            EventCategory::Memory => "/memory",
            EventCategory::Log => "/logs",
            EventCategory::Connections => "/connections",
        }
    }
}

impl EventTransport for WsEventTransport {
    fn subscribe(
        &mut self,
        category: EventCategory,
        sink: Sender<RawEvent>,
    ) -> Result<Box<dyn EventSubscription>, TransportError> {
        let url = self
            .endpoint
            .ws_url(Self::stream_path(category))
            .map_err(|error| TransportError::with_source("invalid event-stream endpoint", error))?;

        let stream = TcpStream::connect((self.endpoint.host(), self.endpoint.port()))
            .map_err(|error| {
                TransportError::with_source(
                    format!("failed to connect to event stream '{category}'"),
                    error,
                )
            })?;
        let shutdown = stream.try_clone().map_err(|error| {
            TransportError::with_source("failed to clone event-stream socket", error)
        })?;

        let (mut socket, _response) = client(url.as_str(), stream).map_err(|error| {
            TransportError::new(format!(
                "websocket handshake failed for '{category}': {error}"
            ))
        })?;

        let reader = thread::spawn(move || {
            loop {
                match socket.read() {
                    Ok(Message::Text(text)) => {
                        let Ok(payload) = serde_json::from_str::<Value>(&text) else {
                            // Undecodable frames are the transport's problem,
                            // not the snapshot's; skip them here.
                            continue;
                        };
                        if sink.send(RawEvent::new(category, payload)).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(error) => {
                        debug!(
                            target: TRANSPORT_TARGET,
                            %category,
                            error = %error,
                            "event stream closed"
                        );
                        break;
                    }
                }
            }
        });

        debug!(target: TRANSPORT_TARGET, %category, "event stream connected");
        Ok(Box::new(WsSubscription {
            category,
            shutdown: Some(shutdown),
            reader: Some(reader),
        }))
    }
}

/// One open websocket stream.
struct WsSubscription {
    category: EventCategory,
    shutdown: Option<TcpStream>,
    reader: Option<JoinHandle<()>>,
}

impl EventSubscription for WsSubscription {
    fn category(&self) -> EventCategory {
        self.category
    }

    fn close(&mut self) {
        if let Some(stream) = self.shutdown.take()
            && let Err(error) = stream.shutdown(Shutdown::Both)
        {
            warn!(
                target: TRANSPORT_TARGET,
                category = %self.category,
                error = %error,
                "failed to shut event stream down"
            );
        }
        if let Some(reader) = self.reader.take()
            && reader.join().is_err()
        {
            warn!(
                target: TRANSPORT_TARGET,
                category = %self.category,
                "event-stream reader panicked"
            );
        }
    }
}

impl Drop for WsSubscription {
    fn drop(&mut self) {
        self.close();
    }
}
