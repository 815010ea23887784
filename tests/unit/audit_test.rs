//! Tests for audit sinks

use render_coord::core::{
    build_audit_event, AuditSink, InMemoryAuditSink, LeaseAction, TracingAuditSink,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let event = build_audit_event(
        "LOCK_HISTORICAL_TRANSFER",
        LeaseAction::Acquire,
        1_700_000_000_000,
        Some("replica-a".to_string()),
    );

    sink.record(event.clone());
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].event_id, event.event_id);
    assert_eq!(events[0].task_name, "LOCK_HISTORICAL_TRANSFER");
    assert_eq!(events[0].action, LeaseAction::Acquire);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event("LOCK_A", LeaseAction::Acquire, 1, None));
    sink.record(build_audit_event("LOCK_B", LeaseAction::Acquire, 2, None));
    sink.record(build_audit_event("LOCK_C", LeaseAction::Acquire, 3, None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].task_name, "LOCK_B"); // First one popped
    assert_eq!(events[1].task_name, "LOCK_C");
}

#[test]
fn test_zero_capacity_sink_drops_everything() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event("LOCK_A", LeaseAction::Skip, 0, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_clones_share_the_buffer() {
    let sink = InMemoryAuditSink::new(4);
    let mut writer = sink.clone();
    writer.record(build_audit_event("LOCK_A", LeaseAction::Release, 7, None));
    assert_eq!(sink.events().len(), 1);
}

#[test]
fn test_build_audit_event() {
    let first = build_audit_event(
        "LOCK_STALE_CHECKPOINT",
        LeaseAction::ReleaseLost,
        42,
        Some("token superseded".to_string()),
    );
    let second = build_audit_event("LOCK_STALE_CHECKPOINT", LeaseAction::Skip, 0, None);

    assert_eq!(first.task_name, "LOCK_STALE_CHECKPOINT");
    assert_eq!(first.action.as_str(), "release_lost");
    assert_eq!(first.token, 42);
    assert_eq!(first.detail, Some("token superseded".to_string()));
    assert!(first.created_at_ms > 0);
    assert_ne!(first.event_id, second.event_id);
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingAuditSink;
    sink.record(build_audit_event("LOCK_A", LeaseAction::Acquire, 1, None));
}
