//! Tests for configuration validation

use std::time::Duration;

use render_coord::config::{
    CoordConfig, LeaseConfig, LivenessConfig, StoreBackendConfig, TaskLeaseConfig,
};

#[test]
fn test_default_config_is_valid() {
    let cfg = CoordConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.store, StoreBackendConfig::InMemory);
    assert_eq!(cfg.leases.default_timeout_secs, 300);
    assert_eq!(cfg.liveness.staleness_threshold(), Duration::from_secs(300));
    assert_eq!(cfg.liveness.host_report_grace(), Duration::from_secs(600));
    assert_eq!(cfg.liveness.check_interval(), Duration::from_secs(30));
}

#[test]
fn test_lease_config_invalid_default_timeout() {
    let invalid = LeaseConfig {
        default_timeout_secs: 0,
        ..LeaseConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_lease_config_invalid_task_entries() {
    let zero_timeout = LeaseConfig::default().with_task("LOCK_A", 0, None);
    assert!(zero_timeout.validate().is_err());

    let zero_interval = LeaseConfig::default().with_task("LOCK_A", 60, Some(0));
    assert!(zero_interval.validate().is_err());

    let blank_name = LeaseConfig::default().with_task("  ", 60, None);
    assert!(blank_name.validate().is_err());
}

#[test]
fn test_liveness_config_invalid_threshold() {
    let invalid = LivenessConfig {
        staleness_threshold_secs: 0,
        ..LivenessConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_zero_grace_window_is_allowed() {
    let cfg = LivenessConfig {
        host_report_grace_secs: 0,
        ..LivenessConfig::default()
    };
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.host_report_grace(), Duration::ZERO);
}

#[test]
fn test_postgres_backend_requires_url() {
    let cfg = CoordConfig {
        store: StoreBackendConfig::Postgres {
            url: String::new(),
            max_connections: 4,
        },
        ..CoordConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("url"));
}

#[test]
fn test_parse_json_config() {
    let cfg = CoordConfig::from_json_str(
        r#"{
            "store": {"kind": "postgres", "url": "postgres://cue@db/cue", "max_connections": 4},
            "leases": {
                "default_timeout_secs": 120,
                "tasks": {
                    "LOCK_STALE_CHECKPOINT": {"timeout_secs": 60, "min_interval_secs": 300}
                }
            },
            "liveness": {"staleness_threshold_secs": 240}
        }"#,
    )
    .unwrap();

    assert_eq!(
        cfg.store,
        StoreBackendConfig::Postgres {
            url: "postgres://cue@db/cue".to_string(),
            max_connections: 4,
        }
    );
    assert_eq!(cfg.leases.default_timeout_secs, 120);
    assert_eq!(
        cfg.leases.tasks.get("LOCK_STALE_CHECKPOINT"),
        Some(&TaskLeaseConfig {
            timeout_secs: 60,
            min_interval_secs: Some(300),
        })
    );
    assert_eq!(cfg.liveness.staleness_threshold_secs, 240);
    assert_eq!(cfg.liveness.host_report_grace_secs, 600);
}

#[test]
fn test_parse_json_rejects_invalid_values() {
    assert!(CoordConfig::from_json_str(r#"{"liveness": {"check_interval_secs": 0}}"#).is_err());
    assert!(CoordConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_json_round_trip_keeps_tasks() {
    let cfg = CoordConfig {
        leases: LeaseConfig::default().with_task("LOCK_HISTORICAL_TRANSFER", 900, None),
        ..CoordConfig::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(CoordConfig::from_json_str(&json).unwrap(), cfg);
}
