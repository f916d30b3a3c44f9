//! Audit trail of protocol traffic
//!
//! A [`DiagnosticsSink`] receives one redacted [`DiagnosticRecord`] per
//! message crossing the wire. Recording is strictly best effort: a disabled
//! or failing sink never affects the protocol path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::types::identifiers::RequestId;

/// Keys whose values never leave the process unredacted
const SECRET_KEY_MARKERS: &[&str] = &["apikey", "authorization", "password", "secret"];

/// Direction and kind of a recorded message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Request sent to the engine
    OutboundRequest,
    /// Response sent to the engine (answer to an inbound request)
    OutboundResponse,
    /// Response received from the engine
    InboundResponse,
    /// Request received from the engine
    InboundRequest,
    /// Notification received from the engine
    InboundNotification,
}

/// One recorded message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    /// When the message crossed the wire
    pub timestamp: DateTime<Utc>,
    /// Direction and kind
    pub direction: Direction,
    /// Method, when the message has one
    pub method: Option<String>,
    /// Request id, when the message has one
    pub request_id: Option<RequestId>,
    /// Redacted message body
    pub payload: Value,
}

impl DiagnosticRecord {
    /// Build a record, redacting `payload`
    #[must_use]
    pub fn new(
        direction: Direction,
        method: Option<&str>,
        request_id: Option<&RequestId>,
        payload: &Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            direction,
            method: method.map(String::from),
            request_id: request_id.cloned(),
            payload: redact(payload),
        }
    }
}

/// Receiver of diagnostic records
pub trait DiagnosticsSink: Send + Sync {
    /// Whether records should be produced at all
    fn is_enabled(&self) -> bool;

    /// Store one record
    ///
    /// # Errors
    /// Implementations may fail; failures are logged and ignored
    fn append(&self, record: DiagnosticRecord) -> Result<()>;
}

/// Hand a record to the sink, if enabled; never fails
pub(crate) fn record(
    sink: Option<&Arc<dyn DiagnosticsSink>>,
    build: impl FnOnce() -> DiagnosticRecord,
) {
    let Some(sink) = sink else {
        return;
    };
    if !sink.is_enabled() {
        return;
    }
    if let Err(e) = sink.append(build()) {
        log::debug!("Diagnostics sink rejected record: {e}");
    }
}

/// Replace secrets and user-authored text with placeholders
#[must_use]
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let lowered = key.to_ascii_lowercase();
                    let redacted = if is_secret_key(&lowered) {
                        Value::String("[redacted]".to_string())
                    } else if key == "text" {
                        match v {
                            Value::String(s) => {
                                Value::String(format!("[redacted {} chars]", s.chars().count()))
                            }
                            other => redact(other),
                        }
                    } else {
                        redact(v)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

fn is_secret_key(lowered: &str) -> bool {
    lowered.ends_with("token") || SECRET_KEY_MARKERS.iter().any(|m| lowered.contains(m))
}

/// In-memory sink, handy for tests and short-lived audits
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemoryDiagnostics {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    #[must_use]
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn is_enabled(&self) -> bool {
        true
    }

    fn append(&self, record: DiagnosticRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}
