//! Tests for builder modules

use std::sync::Arc;

use render_coord::builders::{build_coordinator, build_with};
use render_coord::config::{CoordConfig, LeaseConfig, StoreBackendConfig};
use render_coord::core::CoordError;
use render_coord::infra::InMemoryStore;
use render_coord::util::clock::ManualClock;

#[tokio::test]
async fn test_build_coordinator_registers_builtin_leases() {
    let store = Arc::new(InMemoryStore::new());
    let cfg = CoordConfig {
        leases: LeaseConfig::default()
            .with_task("LOCK_HARDWARE_STATE_CHECK", 120, None)
            .with_task("LOCK_RENDER_REPORT", 60, Some(3_600)),
        ..CoordConfig::default()
    };
    let coord = build_coordinator(&cfg, Arc::clone(&store), ManualClock::new(1_000)).unwrap();

    // Two configured, plus the two built-in locks without an entry.
    assert_eq!(coord.register_leases().await.unwrap(), 4);
    assert_eq!(store.lease("LOCK_HARDWARE_STATE_CHECK").unwrap().timeout_ms, 120_000);
    assert_eq!(store.lease("LOCK_HISTORICAL_TRANSFER").unwrap().timeout_ms, 300_000);
    assert!(store.lease("LOCK_STALE_CHECKPOINT").is_some());
    assert!(store.lease("LOCK_RENDER_REPORT").is_some());
}

#[tokio::test]
async fn test_components_share_one_store() {
    let cfg = CoordConfig::default();
    let coord =
        build_coordinator(&cfg, Arc::new(InMemoryStore::new()), ManualClock::new(1_000)).unwrap();
    coord.store.register_host("render-01", 8, 1_000);

    assert!(coord.ledger.allocate("render-01", 2).await.unwrap());
    assert_eq!(coord.store.host("render-01").unwrap().idle_cores, 6);
    assert_eq!(coord.liveness.sweep().await.unwrap(), 0);
}

#[test]
fn test_build_rejects_invalid_config() {
    let mut cfg = CoordConfig::default();
    cfg.leases.default_timeout_secs = 0;

    let result = build_coordinator(&cfg, Arc::new(InMemoryStore::new()), ManualClock::new(0));
    assert!(matches!(result, Err(CoordError::Config(_))));
}

#[test]
fn test_build_with_uses_backend_section() {
    let cfg = CoordConfig::default();
    let coord = build_with(
        &cfg,
        |backend| match backend {
            StoreBackendConfig::InMemory => Ok(InMemoryStore::new()),
            StoreBackendConfig::Postgres { .. } => {
                Err(CoordError::Config("postgres not wanted here".to_string()))
            }
        },
        ManualClock::new(0),
    )
    .unwrap();
    assert_eq!(coord.store.host_count(), 0);

    let pg = CoordConfig {
        store: StoreBackendConfig::Postgres {
            url: "postgres://localhost/cue".to_string(),
            max_connections: 2,
        },
        ..CoordConfig::default()
    };
    let result = build_with(
        &pg,
        |_| Err::<InMemoryStore, _>(CoordError::Config("unsupported".to_string())),
        ManualClock::new(0),
    );
    assert!(matches!(result, Err(CoordError::Config(_))));
}
