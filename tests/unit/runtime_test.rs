//! Tests for the tokio maintenance loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use render_coord::builders::build_coordinator;
use render_coord::config::CoordConfig;
use render_coord::infra::InMemoryStore;
use render_coord::runtime::{spawn_hardware_check, MaintenanceLoop};
use render_coord::util::clock::ManualClock;
use render_coord::util::serde::HostState;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_loop_ticks_until_shutdown() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let maintenance = MaintenanceLoop::spawn(
        &tokio::runtime::Handle::current(),
        Duration::from_millis(10),
        move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!maintenance.is_finished());
    maintenance.shutdown().await;

    let after_shutdown = runs.load(Ordering::SeqCst);
    assert!(after_shutdown >= 2);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(runs.load(Ordering::SeqCst), after_shutdown);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hardware_check_loop_marks_stale_hosts() {
    let t0 = 1_700_000_000_000;
    let store = Arc::new(InMemoryStore::new());
    store.register_host("stale", 16, t0 - 600_000);
    let coord =
        build_coordinator(&CoordConfig::default(), Arc::clone(&store), ManualClock::new(t0))
            .unwrap();
    coord.register_leases().await.unwrap();

    let maintenance = spawn_hardware_check(
        &tokio::runtime::Handle::current(),
        Arc::clone(&coord.hardware_check),
        Duration::from_millis(20),
    );

    let mut down = false;
    for _ in 0..50 {
        if store.host("stale").unwrap().state == HostState::Down {
            down = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    maintenance.shutdown().await;

    assert!(down);
    assert!(!store.lease("LOCK_HARDWARE_STATE_CHECK").unwrap().is_held());
}
