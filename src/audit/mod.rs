//! Audit trail.
//!
//! # Data Flow
//! ```text
//! Pipeline entry → AuditRecorder::open → AuditEntry (held by the request)
//!     → identify(subject) after authentication
//!     → close(status) when the response is ready, or Drop → 499
//!
//! AuditEntry → unbounded queue → writer task → AuditSink
//! ```
//!
//! # Design Decisions
//! - The request path only enqueues; sink I/O happens on one writer task
//! - Exactly one open and one close per request, enforced by the entry type
//! - The recorder is injected, never global

pub mod record;
pub mod sink;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub use record::{AuditEvent, AuditRecord};
pub use sink::{AuditSink, MemorySink, TracingSink};

/// Status recorded when a request ends without producing a response.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

enum Command {
    Event(AuditEvent),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicU64,
    closed: AtomicU64,
}

/// Open/close totals since startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditStats {
    pub opened: u64,
    pub closed: u64,
}

impl AuditStats {
    pub fn open_now(&self) -> u64 {
        self.opened.saturating_sub(self.closed)
    }
}

/// Handle for opening audit entries. Cheap to clone.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
}

impl AuditRecorder {
    /// Start the writer task. It exits once every recorder clone is dropped
    /// and the queue is empty.
    pub fn spawn<S: AuditSink>(mut sink: S) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        let writer = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Event(event) => sink.write(&event),
                    Command::Flush(done) => {
                        sink.flush();
                        let _ = done.send(());
                    }
                }
            }
            sink.flush();
            tracing::debug!("Audit writer stopped");
        });

        let recorder = Self {
            tx,
            counters: Arc::new(Counters::default()),
        };
        (recorder, writer)
    }

    /// Open the record for a request.
    pub fn open(&self, request_id: &str, method: &str, path: &str, subject: &str) -> AuditEntry {
        let record = AuditRecord {
            request_id: request_id.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            subject: subject.to_string(),
            status: None,
            latency_ms: None,
            timestamp: Utc::now(),
        };
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.send(AuditEvent::Opened(record.clone()));

        AuditEntry {
            recorder: self.clone(),
            record: Some(record),
            started: Instant::now(),
            status: None,
        }
    }

    /// Wait until everything enqueued before this call has been written.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            opened: self.counters.opened.load(Ordering::SeqCst),
            closed: self.counters.closed.load(Ordering::SeqCst),
        }
    }

    fn send(&self, event: AuditEvent) {
        if self.tx.send(Command::Event(event)).is_err() {
            tracing::warn!("Audit writer is gone, event dropped");
        }
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("stats", &self.stats())
            .finish()
    }
}

/// The open record of one in-flight request.
///
/// Closed exactly once: explicitly via [`AuditEntry::close`], or on drop
/// with the last status reached (499 if none).
#[derive(Debug)]
pub struct AuditEntry {
    recorder: AuditRecorder,
    record: Option<AuditRecord>,
    started: Instant,
    status: Option<u16>,
}

impl AuditEntry {
    /// Attach the authenticated subject.
    pub fn identify(&mut self, subject: &str) {
        if let Some(record) = self.record.as_mut() {
            if record.subject != subject {
                record.subject = subject.to_string();
            }
        }
    }

    /// Remember the status reached so far.
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn close(mut self, status: u16) {
        self.status = Some(status);
        self.finish();
    }

    fn finish(&mut self) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        record.status = Some(self.status.unwrap_or(CLIENT_CLOSED_REQUEST));
        record.latency_ms = Some(self.started.elapsed().as_millis() as u64);
        record.timestamp = Utc::now();

        self.recorder.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.recorder.send(AuditEvent::Closed(record));
    }
}

impl Drop for AuditEntry {
    fn drop(&mut self) {
        if self.record.is_some() {
            tracing::debug!(status = ?self.status, "Audit entry closed on drop");
        }
        self.finish();
    }
}
