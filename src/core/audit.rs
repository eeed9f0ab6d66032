//! Audit trail of job and bid transitions.
//!
//! Provides the sink abstraction and a bounded in-memory implementation.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::clock::now_ms;

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related job identifier.
    pub job_id: String,
    /// Account that triggered the transition, or `system`.
    pub actor: String,
    /// Action taken (post, bid, withdraw, accept, reject, cancel, complete,
    /// dispute, resolve, expire).
    pub action: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// Shared handle to an audit sink, as held by services.
pub type SharedAuditSink = Arc<Mutex<Box<dyn AuditSink>>>;

/// In-memory audit sink for testing and dev.
///
/// Clones share the same buffer, so a test can keep one clone and hand
/// another to a service.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Wrap a clone of this sink for injection into services.
    #[must_use]
    pub fn shared(&self) -> SharedAuditSink {
        let sink: Box<dyn AuditSink> = Box::new(self.clone());
        Arc::new(Mutex::new(sink))
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that forwards every event to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::info!(
            target: "job_award::audit",
            job = %event.job_id,
            actor = %event.actor,
            action = %event.action,
            payload = event.payload.as_deref().unwrap_or(""),
            "audit"
        );
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    event_id: impl Into<String>,
    job_id: impl Into<String>,
    actor: impl Into<String>,
    action: impl Into<String>,
    payload: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: event_id.into(),
        job_id: job_id.into(),
        actor: actor.into(),
        action: action.into(),
        created_at_ms: now_ms(),
        payload,
    }
}

/// Record `action` on `job_id` into an optional sink, stamped `at_ms`.
pub(crate) fn record(
    sink: Option<&SharedAuditSink>,
    at_ms: u128,
    job_id: impl std::fmt::Display,
    actor: impl std::fmt::Display,
    action: &str,
    payload: Option<String>,
) {
    if let Some(sink) = sink {
        let job_id = job_id.to_string();
        let event_id = format!("{job_id}-{action}-{}", uuid::Uuid::new_v4());
        let mut event = build_audit_event(event_id, job_id, actor.to_string(), action, payload);
        event.created_at_ms = at_ms;
        sink.lock().record(event);
    }
}
