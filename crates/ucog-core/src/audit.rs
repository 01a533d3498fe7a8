//! Best-effort audit hook exposed to the surrounding system.
//!
//! The engine reports noteworthy events through a single callback. Sinks
//! must be infallible from the engine's point of view: an event that
//! cannot be recorded is dropped, never surfaced as a caller error.

use std::fmt;

/// Kinds of events the engine reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditKind {
    /// A compression-ratio anomaly alert fired.
    AnomalyAlert,
    /// A batch record encode completed successfully.
    BatchEncode,
    /// A delta violated the expansion limit during decode.
    ExpansionViolation,
}

impl AuditKind {
    /// Stable string form for log lines and audit rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::AnomalyAlert => "anomaly_alert",
            AuditKind::BatchEncode => "batch_encode",
            AuditKind::ExpansionViolation => "expansion_violation",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for engine audit events.
pub trait AuditSink: Send + Sync {
    /// Record one event. Implementations must not panic; events are
    /// best-effort and failures stay inside the sink.
    fn on_event(&self, kind: AuditKind, target: &str, detail: &str);
}

/// Sink that forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn on_event(&self, kind: AuditKind, target: &str, detail: &str) {
        tracing::info!(kind = kind.as_str(), target, detail, "audit event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink(Mutex<Vec<(AuditKind, String)>>);

    impl AuditSink for RecordingSink {
        fn on_event(&self, kind: AuditKind, target: &str, _detail: &str) {
            self.0.lock().unwrap().push((kind, target.to_string()));
        }
    }

    #[test]
    fn test_sink_receives_events() {
        let sink = RecordingSink(Mutex::new(Vec::new()));
        sink.on_event(AuditKind::BatchEncode, "batch-1", "ratio=4.2");
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, AuditKind::BatchEncode);
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(AuditKind::AnomalyAlert.as_str(), "anomaly_alert");
        assert_eq!(AuditKind::ExpansionViolation.to_string(), "expansion_violation");
    }
}
