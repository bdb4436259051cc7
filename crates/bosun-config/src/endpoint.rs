//! Declarative description of the kernel's control API endpoint.
//!
//! The same host/port pair serves both the request/response API (HTTP)
//! and the push-event streams (websocket); the token, when present, is
//! carried as a query parameter on every request.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Host, port, and access token of the kernel's control API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ApiEndpoint {
    host: String,
    port: u16,
    token: String,
}

/// Errors raised while assembling endpoint URLs.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The host/port pair did not form a valid URL authority.
    #[error("invalid endpoint authority '{authority}': {source}")]
    InvalidAuthority {
        /// The offending authority string.
        authority: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
}

impl ApiEndpoint {
    /// Builds an endpoint description.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            token: token.into(),
        }
    }

    /// Host of the control API.
    #[must_use]
    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    /// Port of the control API.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Access token; empty when the API is unauthenticated.
    #[must_use]
    pub fn token(&self) -> &str {
        self.token.as_str()
    }

    /// Builds an HTTP URL for the given API path.
    pub fn http_url(&self, path: &str) -> Result<Url, EndpointError> {
        self.build_url("http", path)
    }

    /// Builds a websocket URL for the given event-stream path.
    pub fn ws_url(&self, path: &str) -> Result<Url, EndpointError> {
        self.build_url("ws", path)
    }

    fn build_url(&self, scheme: &str, path: &str) -> Result<Url, EndpointError> {
        let authority = format!("{scheme}://{}:{}", self.host, self.port);
        let mut url = Url::parse(&authority).map_err(|source| EndpointError::InvalidAuthority {
            authority: authority.clone(),
            source,
        })?;
        url.set_path(path);
        if !self.token.is_empty() {
            url.query_pairs_mut().append_pair("token", &self.token);
        }
        Ok(url)
    }
}

impl fmt::Display for ApiEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}
