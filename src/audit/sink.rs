//! Destinations for audit events.

use std::sync::{Arc, Mutex};

use crate::audit::record::{AuditEvent, AuditRecord};

/// Receives audit events, one at a time, on the recorder's writer task.
pub trait AuditSink: Send + 'static {
    fn write(&mut self, event: &AuditEvent);

    /// Called when a flush is requested; buffered sinks persist here.
    fn flush(&mut self) {}
}

impl AuditSink for Box<dyn AuditSink> {
    fn write(&mut self, event: &AuditEvent) {
        (**self).write(event)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}

/// Emits each event as a structured log line under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn write(&mut self, event: &AuditEvent) {
        match event {
            AuditEvent::Opened(r) => tracing::info!(
                target: "audit",
                event = "opened",
                request_id = %r.request_id,
                method = %r.method,
                path = %r.path,
                subject = %r.subject,
                timestamp = %r.timestamp.to_rfc3339(),
            ),
            AuditEvent::Closed(r) => tracing::info!(
                target: "audit",
                event = "closed",
                request_id = %r.request_id,
                method = %r.method,
                path = %r.path,
                subject = %r.subject,
                status = r.status,
                latency_ms = r.latency_ms,
                timestamp = %r.timestamp.to_rfc3339(),
            ),
        }
    }
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn opened(&self) -> Vec<AuditRecord> {
        self.records(false)
    }

    pub fn closed(&self) -> Vec<AuditRecord> {
        self.records(true)
    }

    fn records(&self, closed: bool) -> Vec<AuditRecord> {
        self.snapshot()
            .into_iter()
            .filter(|event| event.is_close() == closed)
            .map(|event| event.record().clone())
            .collect()
    }
}

impl AuditSink for MemorySink {
    fn write(&mut self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
