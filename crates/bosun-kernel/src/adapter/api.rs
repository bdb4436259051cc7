//! Blocking HTTP client for the kernel's local control API.

use std::collections::BTreeMap;
use std::time::Duration;

use bosun_config::ApiEndpoint;
use serde_json::Value;
use tracing::debug;

use crate::control::{ControlError, KernelIdentity, ProxyEntry, RouteRule};

const API_TARGET: &str = "bosun_kernel::adapter";

/// Timeout applied to every control API request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe URL used when the caller does not supply one.
const DEFAULT_PROBE_URL: &str = "https://www.gstatic.com/generate_204";

/// Latency probe timeout in milliseconds, passed to the kernel.
const PROBE_TIMEOUT_MS: u32 = 5000;

/// Thin wrapper over the kernel's request/response API.
///
/// The client never routes through a system proxy: it must reach the
/// kernel even while the kernel is reconfiguring that proxy.
#[derive(Debug)]
pub(super) struct ApiClient {
    http: reqwest::blocking::Client,
    endpoint: ApiEndpoint,
}

impl ApiClient {
    /// Builds a client for the supplied endpoint.
    pub(super) fn new(endpoint: ApiEndpoint) -> Result<Self, ControlError> {
        let http = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ControlError::with_source("failed to build HTTP client", error))?;
        Ok(Self { http, endpoint })
    }

    /// Fetches the kernel's identity from `/version`.
    pub(super) fn version(&self) -> Result<KernelIdentity, ControlError> {
        let payload = self.get_json("/version")?;
        serde_json::from_value(payload)
            .map_err(|error| ControlError::with_source("malformed /version payload", error))
    }

    /// Fetches the proxy roster from `/proxies`, sorted by name.
    pub(super) fn proxies(&self) -> Result<Vec<ProxyEntry>, ControlError> {
        let payload = self.get_json("/proxies")?;
        let map = payload
            .get("proxies")
            .and_then(Value::as_object)
            .ok_or_else(|| ControlError::new("malformed /proxies payload"))?;

        let mut entries: BTreeMap<String, ProxyEntry> = BTreeMap::new();
        for (name, value) in map {
            let entry: ProxyEntry = serde_json::from_value(value.clone()).map_err(|error| {
                ControlError::with_source(format!("malformed proxy entry '{name}'"), error)
            })?;
            entries.insert(name.clone(), entry);
        }
        Ok(entries.into_values().collect())
    }

    /// Fetches the routing rules from `/rules`.
    pub(super) fn rules(&self) -> Result<Vec<RouteRule>, ControlError> {
        let payload = self.get_json("/rules")?;
        let rules = payload
            .get("rules")
            .cloned()
            .ok_or_else(|| ControlError::new("malformed /rules payload"))?;
        serde_json::from_value(rules)
            .map_err(|error| ControlError::with_source("malformed /rules payload", error))
    }

    /// Probes one proxy's latency via `/proxies/{name}/delay`.
    pub(super) fn latency(
        &self,
        proxy: &str,
        probe_url: Option<&str>,
    ) -> Result<u64, ControlError> {
        let mut url = self
            .endpoint
            .http_url(&format!("/proxies/{proxy}/delay"))
            .map_err(|error| ControlError::with_source("invalid control API endpoint", error))?;
        url.query_pairs_mut()
            .append_pair("url", probe_url.unwrap_or(DEFAULT_PROBE_URL))
            .append_pair("timeout", &PROBE_TIMEOUT_MS.to_string());

        let payload = self.fetch(url)?;
        payload
            .get("delay")
            .and_then(Value::as_u64)
            .ok_or_else(|| ControlError::new(format!("no delay reported for proxy '{proxy}'")))
    }

    fn get_json(&self, path: &str) -> Result<Value, ControlError> {
        let url = self
            .endpoint
            .http_url(path)
            .map_err(|error| ControlError::with_source("invalid control API endpoint", error))?;
        self.fetch(url)
    }

    fn fetch(&self, url: url::Url) -> Result<Value, ControlError> {
        debug!(target: API_TARGET, path = url.path(), "control API request");
        let response = self
            .http
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .map_err(|error| {
                ControlError::with_source(format!("request to {} failed", url.path()), error)
            })?;

        if !response.status().is_success() {
            return Err(ControlError::new(format!(
                "control API returned {} for {}",
                response.status(),
                url.path()
            )));
        }
        response.json().map_err(|error| {
            ControlError::with_source(format!("malformed response from {}", url.path()), error)
        })
    }
}
