//! Coordination configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming a JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "RENDER_COORD_CONFIG";
/// Environment variable overriding the Postgres connection URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const fn default_lease_timeout_secs() -> u64 {
    300
}

const fn default_staleness_threshold_secs() -> u64 {
    300
}

const fn default_host_report_grace_secs() -> u64 {
    600
}

const fn default_check_interval_secs() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    10
}

/// Store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// In-process store; only coordinates callers sharing one process.
    #[default]
    InMemory,
    /// Shared Postgres database.
    Postgres {
        /// Connection URL.
        url: String,
        /// Pool size.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

/// Lease settings for one maintenance task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLeaseConfig {
    /// Seconds after which a held lease may be taken over.
    pub timeout_secs: u64,
    /// Minimum seconds between successful runs, for spaced acquisition.
    #[serde(default)]
    pub min_interval_secs: Option<u64>,
}

/// Lease settings for all maintenance tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Timeout for tasks without their own entry.
    #[serde(default = "default_lease_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Per-task overrides keyed by task (lock) name.
    #[serde(default)]
    pub tasks: HashMap<String, TaskLeaseConfig>,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_lease_timeout_secs(),
            tasks: HashMap::new(),
        }
    }
}

impl LeaseConfig {
    /// Add or replace a task entry.
    #[must_use]
    pub fn with_task(
        mut self,
        task_name: impl Into<String>,
        timeout_secs: u64,
        min_interval_secs: Option<u64>,
    ) -> Self {
        self.tasks.insert(
            task_name.into(),
            TaskLeaseConfig {
                timeout_secs,
                min_interval_secs,
            },
        );
        self
    }

    /// Takeover timeout for a task.
    pub fn timeout_for(&self, task_name: &str) -> Duration {
        let secs = self
            .tasks
            .get(task_name)
            .map_or(self.default_timeout_secs, |t| t.timeout_secs);
        Duration::from_secs(secs)
    }

    /// Configured minimum spacing between runs of a task, if any.
    pub fn min_interval_for(&self, task_name: &str) -> Option<Duration> {
        self.tasks
            .get(task_name)
            .and_then(|t| t.min_interval_secs)
            .map(Duration::from_secs)
    }

    /// Validate timeouts and task names.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_timeout_secs == 0 {
            return Err("default_timeout_secs must be greater than 0".into());
        }
        for (name, task) in &self.tasks {
            if name.trim().is_empty() {
                return Err("task names must not be empty".into());
            }
            if task.timeout_secs == 0 {
                return Err(format!("task `{name}`: timeout_secs must be greater than 0"));
            }
            if task.min_interval_secs == Some(0) {
                return Err(format!(
                    "task `{name}`: min_interval_secs must be greater than 0"
                ));
            }
        }
        Ok(())
    }
}

/// Host liveness settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Seconds without a heartbeat before an `UP` host is marked `DOWN`.
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,
    /// Seconds to wait after a store outage before marking hosts down again.
    #[serde(default = "default_host_report_grace_secs")]
    pub host_report_grace_secs: u64,
    /// Seconds between hardware-state checks in the maintenance loop.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_secs: default_staleness_threshold_secs(),
            host_report_grace_secs: default_host_report_grace_secs(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

impl LivenessConfig {
    /// Staleness threshold as a duration.
    pub const fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    /// Grace window as a duration.
    pub const fn host_report_grace(&self) -> Duration {
        Duration::from_secs(self.host_report_grace_secs)
    }

    /// Maintenance loop period as a duration.
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Validate liveness values.
    pub fn validate(&self) -> Result<(), String> {
        if self.staleness_threshold_secs == 0 {
            return Err("staleness_threshold_secs must be greater than 0".into());
        }
        if self.check_interval_secs == 0 {
            return Err("check_interval_secs must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CoordConfig {
    /// Store backend.
    #[serde(default)]
    pub store: StoreBackendConfig,
    /// Lease settings.
    #[serde(default)]
    pub leases: LeaseConfig,
    /// Liveness settings.
    #[serde(default)]
    pub liveness: LivenessConfig,
}

impl CoordConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        if let StoreBackendConfig::Postgres {
            url,
            max_connections,
        } = &self.store
        {
            if url.trim().is_empty() {
                return Err("store: postgres url must not be empty".into());
            }
            if *max_connections == 0 {
                return Err("store: max_connections must be greater than 0".into());
            }
        }
        self.leases
            .validate()
            .map_err(|e| format!("leases invalid: {e}"))?;
        self.liveness
            .validate()
            .map_err(|e| format!("liveness invalid: {e}"))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment.
    ///
    /// Reads a `.env` file if present, parses the JSON file named by
    /// `RENDER_COORD_CONFIG` (defaults otherwise) and lets `DATABASE_URL`
    /// select or override the Postgres backend.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {path}: {e}"))?;
                serde_json::from_str(&raw).map_err(|e| format!("parse error in {path}: {e}"))?
            }
            Err(_) => Self::default(),
        };
        if let Ok(database_url) = std::env::var(DATABASE_URL_ENV) {
            cfg.store = match cfg.store {
                StoreBackendConfig::Postgres {
                    max_connections, ..
                } => StoreBackendConfig::Postgres {
                    url: database_url,
                    max_connections,
                },
                StoreBackendConfig::InMemory => StoreBackendConfig::Postgres {
                    url: database_url,
                    max_connections: default_max_connections(),
                },
            };
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
