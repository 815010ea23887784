//! Audit trail of lease transitions and maintenance runs.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::clock::now_ms;

/// What happened to a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAction {
    /// This replica became the holder.
    Acquire,
    /// The lease was not available.
    Skip,
    /// The holder cleared its own token.
    Release,
    /// The holder tried to release but a newer holder had taken over.
    ReleaseLost,
}

impl LeaseAction {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Acquire => "acquire",
            Self::Skip => "skip",
            Self::Release => "release",
            Self::ReleaseLost => "release_lost",
        }
    }
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Lease / maintenance task name.
    pub task_name: String,
    /// Action taken.
    pub action: LeaseAction,
    /// Lock token involved, `0` if none.
    pub token: u64,
    /// Wall-clock time the event was recorded, epoch milliseconds.
    pub created_at_ms: u64,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// Bounded in-memory audit sink. Clones share the same buffer, so a clone can
/// be handed to a [`crate::core::LeaseManager`] and read back later.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that only emits tracing events.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::info!(
            task = %event.task_name,
            action = event.action.as_str(),
            token = event.token,
            "lease audit"
        );
    }
}

/// Build an audit event stamped with the current wall clock and a fresh id.
pub fn build_audit_event(
    task_name: impl Into<String>,
    action: LeaseAction,
    token: u64,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        task_name: task_name.into(),
        action,
        token,
        created_at_ms: now_ms(),
        detail,
    }
}
