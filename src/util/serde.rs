//! Serializable record types shared by the store ports and backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque host identifier, stable for the lifetime of a worker host.
pub type HostId = String;

/// Lock token value of a free lease.
pub const FREE_TOKEN: u64 = 0;

/// Hardware state of a worker host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostState {
    /// Reporting in and bookable.
    Up,
    /// Missed its heartbeats.
    Down,
    /// Pulled for repair by an operator.
    Repair,
    /// Rebooting.
    Rebooting,
    /// Will reboot as soon as its running frames finish.
    RebootWhenIdle,
}

impl HostState {
    /// Storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Repair => "REPAIR",
            Self::Rebooting => "REBOOTING",
            Self::RebootWhenIdle => "REBOOT_WHEN_IDLE",
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            "REPAIR" => Ok(Self::Repair),
            "REBOOTING" => Ok(Self::Rebooting),
            "REBOOT_WHEN_IDLE" => Ok(Self::RebootWhenIdle),
            other => Err(format!("unknown host state `{other}`")),
        }
    }
}

/// Resource counters and liveness data for one worker host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Host identifier.
    pub host_id: HostId,
    /// Cores not committed to any job. Signed: the ledger has no floor check.
    pub idle_cores: i64,
    /// Current hardware state.
    pub state: HostState,
    /// Last heartbeat, epoch milliseconds.
    pub last_ping_ms: u64,
}

/// Centrally stored mutual-exclusion lease for one maintenance task class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLease {
    /// Unique task name.
    pub task_name: String,
    /// `0` when free, otherwise the epoch millisecond the holder stamped.
    pub lock_token: u64,
    /// Epoch milliseconds of the last successful acquisition, `0` if never run.
    pub last_run_ms: u64,
    /// Milliseconds after which a held lease may be taken over.
    pub timeout_ms: u64,
}

impl TaskLease {
    /// New free lease that has never run.
    pub fn new(task_name: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            task_name: task_name.into(),
            lock_token: FREE_TOKEN,
            last_run_ms: 0,
            timeout_ms,
        }
    }

    /// Whether someone currently holds the lease.
    pub const fn is_held(&self) -> bool {
        self.lock_token != FREE_TOKEN
    }
}
