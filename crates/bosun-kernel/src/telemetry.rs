//! Telemetry state fed by the push-event streams.
//!
//! Each category is replace-or-accumulate on its own; no ordering is
//! imposed across categories. Malformed payloads never mutate state:
//! validation failures are local and deliberately non-propagating,
//! favouring availability over fidelity.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{EventCategory, RawEvent};

/// Capacity of the bounded log ring.
pub const LOG_RING_CAPACITY: usize = 200;

/// Instantaneous and cumulative traffic counters.
///
/// Totals saturate instead of wrapping, so a hostile or corrupt payload can
/// never drive them negative or back past zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficCounters {
    /// Current upload rate in bytes per second.
    pub up: u64,
    /// Current download rate in bytes per second.
    pub down: u64,
    /// Total uploaded bytes since the counters were last reset.
    pub total_up: u64,
    /// Total downloaded bytes since the counters were last reset.
    pub total_down: u64,
}

impl TrafficCounters {
    /// Records one traffic sample: replaces rates, accumulates totals.
    pub fn record(&mut self, up: u64, down: u64) {
        self.up = up;
        self.down = down;
        self.total_up = self.total_up.saturating_add(up);
        self.total_down = self.total_down.saturating_add(down);
    }
}

/// Kernel memory usage, replaced wholesale on every push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Bytes currently in use.
    pub in_use: u64,
    /// Limit imposed by the operating system.
    pub limit: u64,
}

/// Aggregate transfer totals reported with the connection table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferTotals {
    /// Total uploaded bytes across all connections.
    pub upload: u64,
    /// Total downloaded bytes across all connections.
    pub download: u64,
}

/// Connection endpoint details as reported by the kernel.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionMetadata {
    /// Destination address.
    #[serde(rename = "destinationIP")]
    pub destination_ip: String,
    /// Destination port.
    pub destination_port: String,
    /// DNS resolution mode used for the connection.
    pub dns_mode: String,
    /// Matched host name, when sniffed.
    pub host: String,
    /// Transport network (tcp/udp).
    pub network: String,
    /// Path of the originating process, when known.
    pub process_path: String,
    /// Source address.
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    /// Source port.
    pub source_port: String,
    /// Inbound type that accepted the connection.
    #[serde(rename = "type")]
    pub kind: String,
}

/// One active connection; an immutable snapshot replaced wholesale per push.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Kernel-assigned connection identifier.
    pub id: String,
    /// Proxy chain the connection traverses, outermost first.
    pub chains: Vec<String>,
    /// Routing rule that matched.
    pub rule: String,
    /// Payload of the matching rule.
    #[serde(default)]
    pub rule_payload: String,
    /// Uploaded bytes.
    pub upload: u64,
    /// Downloaded bytes.
    pub download: u64,
    /// Start timestamp as reported by the kernel.
    pub start: String,
    /// Endpoint details.
    #[serde(default)]
    pub metadata: ConnectionMetadata,
}

/// One kernel log line retained in the bounded ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Kernel-reported log category.
    pub category: String,
    /// Log line text.
    pub payload: String,
    /// When the supervisor received the line.
    pub received_at: SystemTime,
}

/// Live view of kernel telemetry, owned by the subscription hub.
///
/// External readers always receive clones; nothing outside the hub's pump
/// thread mutates an instance that is being read.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    /// Traffic rates and running totals.
    pub traffic: TrafficCounters,
    /// Memory usage.
    pub memory: MemoryUsage,
    /// Active connections, replaced wholesale per push.
    pub connections: Vec<Connection>,
    /// Aggregate totals reported with the connection table.
    pub connection_totals: TransferTotals,
    /// Bounded log ring, newest first.
    pub logs: VecDeque<LogEntry>,
}

impl TelemetrySnapshot {
    /// Applies one pushed event, validating the payload per category.
    ///
    /// Malformed payloads are dropped without touching prior state.
    pub fn apply(&mut self, event: &RawEvent) {
        match event.category {
            EventCategory::Traffic => self.apply_traffic(&event.payload),
            EventCategory::Memory => self.apply_memory(&event.payload),
            EventCategory::Log => self.apply_log(&event.payload),
            EventCategory::Connections => self.apply_connections(&event.payload),
        }
    }

    /// Returns every counter and buffer to its empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn apply_traffic(&mut self, payload: &Value) {
        let (Some(up_field), Some(down_field)) = (payload.get("up"), payload.get("down")) else {
            return;
        };
        self.traffic
            .record(coerce_count(up_field), coerce_count(down_field));
    }

    fn apply_memory(&mut self, payload: &Value) {
        let (Some(in_use), Some(limit)) = (payload.get("inuse"), payload.get("oslimit")) else {
            return;
        };
        self.memory = MemoryUsage {
            in_use: coerce_count(in_use),
            limit: coerce_count(limit),
        };
    }

    fn apply_log(&mut self, payload: &Value) {
        let (Some(category), Some(line)) = (
            payload.get("type").and_then(Value::as_str),
            payload.get("payload").and_then(Value::as_str),
        ) else {
            return;
        };
        self.logs.push_front(LogEntry {
            category: category.to_owned(),
            payload: line.to_owned(),
            received_at: SystemTime::now(),
        });
        self.logs.truncate(LOG_RING_CAPACITY);
    }

    fn apply_connections(&mut self, payload: &Value) {
        let Some(list) = payload.get("connections") else {
            return;
        };
        let Ok(connections) = serde_json::from_value::<Vec<Connection>>(list.clone()) else {
            return;
        };
        self.connections = connections;
        self.connection_totals = TransferTotals {
            upload: payload.get("uploadTotal").map_or(0, coerce_count),
            download: payload.get("downloadTotal").map_or(0, coerce_count),
        };
    }
}

/// Coerces a JSON field to a non-negative count, treating anything
/// unparseable as zero.
fn coerce_count(value: &Value) -> u64 {
    if let Some(count) = value.as_u64() {
        return count;
    }
    if let Some(signed) = value.as_i64() {
        return u64::try_from(signed).unwrap_or(0);
    }
    value
        .as_str()
        .and_then(|text| text.trim().parse::<u64>().ok())
        .unwrap_or(0)
}
