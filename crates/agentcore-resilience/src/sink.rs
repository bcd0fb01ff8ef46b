//! Outbound structured records
//!
//! Every recorded fault, recovery and alert is forwarded to an [`EventSink`]
//! as a [`StructuredRecord`]. How the record is rendered or stored is up to
//! the sink.

use crate::alert::{Alert, AlertSeverity};
use crate::stats::ErrorEvent;
use agentcore_error::ErrorCategory;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use uuid::Uuid;

/// What a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    /// A failed attempt
    Error,
    /// A failed attempt later followed by success
    Recovery,
    /// A crossed alert threshold
    Alert,
}

/// One forwarded record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredRecord {
    /// What this record describes
    pub kind: RecordKind,
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Event the record refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    /// Operation key
    pub operation: String,
    /// Fault category
    pub category: ErrorCategory,
    /// Alert severity, for alerts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<AlertSeverity>,
    /// Summary
    pub message: String,
    /// Attempt number
    pub attempt: u32,
    /// Whether the execution recovered
    pub recovered: bool,
}

impl StructuredRecord {
    /// Record for a failed attempt
    pub fn error(event: &ErrorEvent) -> Self {
        Self {
            kind: RecordKind::Error,
            timestamp: event.timestamp,
            event_id: Some(event.id),
            operation: event.operation.clone(),
            category: event.category,
            severity: None,
            message: event.message.clone(),
            attempt: event.attempt,
            recovered: event.recovered,
        }
    }

    /// Record for a failed attempt that a later attempt recovered
    pub fn recovery(event: &ErrorEvent, succeeded_on: u32) -> Self {
        Self {
            kind: RecordKind::Recovery,
            timestamp: Utc::now(),
            event_id: Some(event.id),
            operation: event.operation.clone(),
            category: event.category,
            severity: None,
            message: format!("recovered on attempt {succeeded_on}: {}", event.message),
            attempt: succeeded_on,
            recovered: true,
        }
    }

    /// Record for an alert raised by a fault of `operation`
    pub fn alert(alert: &Alert, operation: &str, attempt: u32) -> Self {
        Self {
            kind: RecordKind::Alert,
            timestamp: alert.timestamp,
            event_id: Some(alert.event_id),
            operation: operation.to_string(),
            category: alert.category,
            severity: Some(alert.severity),
            message: alert.message.clone(),
            attempt,
            recovered: false,
        }
    }

    /// JSON form of the record
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Receives structured records
pub trait EventSink: Send + Sync {
    /// Forward one record
    fn emit(&self, record: &StructuredRecord);
}

/// Forward to `sink`, logging instead of unwinding if it panics
pub(crate) fn emit_isolated(sink: &dyn EventSink, record: &StructuredRecord) {
    if catch_unwind(AssertUnwindSafe(|| sink.emit(record))).is_err() {
        tracing::error!(operation = %record.operation, "Event sink panicked");
    }
}

/// Sink that turns records into `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, record: &StructuredRecord) {
        let event_id = record.event_id.map(|id| id.to_string()).unwrap_or_default();
        match record.kind {
            RecordKind::Error => tracing::warn!(
                operation = %record.operation,
                category = %record.category,
                attempt = record.attempt,
                event_id = %event_id,
                "{}",
                record.message
            ),
            RecordKind::Recovery => tracing::info!(
                operation = %record.operation,
                category = %record.category,
                attempt = record.attempt,
                event_id = %event_id,
                "{}",
                record.message
            ),
            RecordKind::Alert => match record.severity {
                Some(AlertSeverity::High | AlertSeverity::Critical) => tracing::error!(
                    operation = %record.operation,
                    category = %record.category,
                    severity = ?record.severity,
                    "ALERT: {}",
                    record.message
                ),
                _ => tracing::warn!(
                    operation = %record.operation,
                    category = %record.category,
                    severity = ?record.severity,
                    "ALERT: {}",
                    record.message
                ),
            },
        }
    }
}

/// Sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<StructuredRecord>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far
    pub fn records(&self) -> Vec<StructuredRecord> {
        self.records.lock().clone()
    }

    /// Records of one kind
    pub fn records_of(&self, kind: RecordKind) -> Vec<StructuredRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    /// Drop every record
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, record: &StructuredRecord) {
        self.records.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_error::Fault;
    use std::time::Duration;

    fn sample_event() -> ErrorEvent {
        ErrorEvent::new(
            "external-dependency:graph",
            ErrorCategory::ExternalDependency,
            &Fault::external("connection reset"),
            2,
        )
    }

    #[tokio::test]
    async fn test_error_record_fields() {
        let event = sample_event();
        let record = StructuredRecord::error(&event);
        assert_eq!(record.kind, RecordKind::Error);
        assert_eq!(record.event_id, Some(event.id));
        assert_eq!(record.attempt, 2);
        assert!(!record.recovered);

        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(json["category"], "external-dependency");
        assert_eq!(json["kind"], "error");
        assert!(json.get("severity").is_none());
    }

    #[tokio::test]
    async fn test_recovery_and_alert_records() {
        let event = sample_event();
        let recovery = StructuredRecord::recovery(&event, 3);
        assert!(recovery.recovered);
        assert_eq!(recovery.attempt, 3);

        let alert = Alert {
            category: ErrorCategory::ExternalDependency,
            severity: AlertSeverity::Critical,
            message: "5 external-dependency errors".into(),
            observed_count: 5,
            threshold: 5,
            window: Duration::from_secs(300),
            timestamp: Utc::now(),
            first_occurrence: None,
            event_id: event.id,
        };
        let record = StructuredRecord::alert(&alert, &event.operation, 2);
        assert_eq!(record.severity, Some(AlertSeverity::Critical));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["severity"], "critical");
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        let event = sample_event();
        sink.emit(&StructuredRecord::error(&event));
        sink.emit(&StructuredRecord::recovery(&event, 2));
        assert_eq!(sink.records().len(), 2);
        assert_eq!(sink.records_of(RecordKind::Recovery).len(), 1);
        sink.clear();
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_sink_isolated() {
        struct Broken;
        impl EventSink for Broken {
            fn emit(&self, _: &StructuredRecord) {
                panic!("disk full");
            }
        }
        emit_isolated(&Broken, &StructuredRecord::error(&sample_event()));
        TracingSink.emit(&StructuredRecord::error(&sample_event()));
    }
}
