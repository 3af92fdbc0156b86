//! Fire-and-forget observability events.
//!
//! Request handling only ever calls `try_send` on a bounded queue; a
//! background drain forwards events to the configured [`AuthzEventSink`].
//! When the queue is full the event is dropped and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use run_authz_sdk::{AuthzEventSink, ComparisonRecord, ErrorKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum AuthzEvent {
    Comparison(ComparisonRecord),
    Error { kind: ErrorKind, details: String },
}

/// Request-path handle. Cheap to clone.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<AuthzEvent>,
    dropped: Arc<AtomicU64>,
}

/// Receiving half; forwards queued events to a sink.
pub struct EventDrain {
    rx: mpsc::Receiver<AuthzEvent>,
}

impl EventEmitter {
    /// Unstarted queue of `capacity` events (at least one).
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, EventDrain) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            EventDrain { rx },
        )
    }

    /// Queue plus a drain task on the current runtime.
    #[must_use]
    pub fn spawn(
        sink: Arc<dyn AuthzEventSink>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (emitter, drain) = Self::channel(capacity);
        let handle = tokio::spawn(drain.run(sink, cancel));
        (emitter, handle)
    }

    pub fn comparison(&self, record: ComparisonRecord) {
        self.offer(AuthzEvent::Comparison(record));
    }

    pub fn error(&self, kind: ErrorKind, details: impl Into<String>) {
        self.offer(AuthzEvent::Error {
            kind,
            details: details.into(),
        });
    }

    /// Events discarded because the queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn offer(&self, event: AuthzEvent) {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl EventDrain {
    /// Forward events until every emitter is gone or `cancel` fires; on
    /// cancel, whatever is already queued is still delivered.
    pub async fn run(mut self, sink: Arc<dyn AuthzEventSink>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => deliver(sink.as_ref(), event),
                    None => return,
                },
            }
        }
        self.rx.close();
        while let Ok(event) = self.rx.try_recv() {
            deliver(sink.as_ref(), event);
        }
    }
}

fn deliver(sink: &dyn AuthzEventSink, event: AuthzEvent) {
    match event {
        AuthzEvent::Comparison(record) => sink.emit_comparison(&record),
        AuthzEvent::Error { kind, details } => sink.emit_error(kind, &details),
    }
}

/// Default sink: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl AuthzEventSink for TracingEventSink {
    fn emit_comparison(&self, record: &ComparisonRecord) {
        let attribute = record
            .attribute
            .as_ref()
            .and_then(|d| serde_json::to_string(&d.access).ok());
        let relationship = record
            .relationship
            .as_ref()
            .and_then(|d| serde_json::to_string(&d.access).ok());

        if record.agreement {
            tracing::debug!(
                subject_id = %record.subject_id,
                tenant_id = %record.tenant_id,
                authoritative = ?record.authoritative,
                attribute = attribute.as_deref(),
                relationship = relationship.as_deref(),
                "authorization decisions agree"
            );
        } else {
            tracing::warn!(
                subject_id = %record.subject_id,
                tenant_id = %record.tenant_id,
                authoritative = ?record.authoritative,
                attribute = attribute.as_deref(),
                relationship = relationship.as_deref(),
                attribute_error = record.attribute_error.as_deref(),
                relationship_error = record.relationship_error.as_deref(),
                "authorization decisions disagree"
            );
        }
    }

    fn emit_error(&self, kind: ErrorKind, details: &str) {
        tracing::warn!(kind = %kind, details, "authorization error event");
    }
}
