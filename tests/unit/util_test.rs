//! Tests for utility functions and shared records

use std::time::Duration;

use render_coord::util::{
    duration_ms, init_tracing, now_ms, Clock, HostRecord, HostState, ManualClock, TaskLease,
    FREE_TOKEN,
};

#[test]
fn test_host_state_round_trips_through_storage_names() {
    for state in [
        HostState::Up,
        HostState::Down,
        HostState::Repair,
        HostState::Rebooting,
        HostState::RebootWhenIdle,
    ] {
        assert_eq!(state.as_str().parse::<HostState>().unwrap(), state);
    }
    assert_eq!(HostState::RebootWhenIdle.to_string(), "REBOOT_WHEN_IDLE");
    assert!("up".parse::<HostState>().is_err());
}

#[test]
fn test_host_record_serializes_state_in_caps() {
    let record = HostRecord {
        host_id: "render-01".to_string(),
        idle_cores: 12,
        state: HostState::Down,
        last_ping_ms: 5,
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["state"], "DOWN");
    assert_eq!(json["idle_cores"], 12);
}

#[test]
fn test_new_task_lease_is_free() {
    let lease = TaskLease::new("LOCK_STALE_CHECKPOINT", 60_000);
    assert_eq!(lease.lock_token, FREE_TOKEN);
    assert_eq!(lease.last_run_ms, 0);
    assert_eq!(lease.timeout_ms, 60_000);
    assert!(!lease.is_held());
}

#[test]
fn test_manual_clock_through_arc() {
    let clock = std::sync::Arc::new(ManualClock::new(10));
    clock.advance(Duration::from_millis(5));
    assert_eq!(Clock::now_ms(&clock), 15);
}

#[test]
fn test_now_ms_moves_forward() {
    let before = now_ms();
    std::thread::sleep(Duration::from_millis(2));
    assert!(now_ms() >= before);
    assert_eq!(duration_ms(Duration::from_secs(300)), 300_000);
}

#[test]
fn test_init_tracing_is_repeatable() {
    init_tracing();
    init_tracing();
}
