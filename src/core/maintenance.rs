//! Maintenance task classes and the lease-guarded hardware-state check.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::{CoordError, HostStore, LeaseManager, LeaseStore, LivenessMonitor, StoreError};
use crate::util::clock::{duration_ms, Clock};

/// Periodic maintenance operations that must run on one replica at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaintenanceTask {
    /// Mark hosts that stopped reporting as down.
    HardwareStateCheck,
    /// Move finished jobs to historical storage.
    HistoricalTransfer,
    /// Reset frames stuck in checkpointing.
    StaleCheckpoint,
}

impl MaintenanceTask {
    /// Every task class.
    pub const ALL: [Self; 3] = [
        Self::HardwareStateCheck,
        Self::HistoricalTransfer,
        Self::StaleCheckpoint,
    ];

    /// Name of the lease guarding this task.
    pub const fn lock_name(self) -> &'static str {
        match self {
            Self::HardwareStateCheck => "LOCK_HARDWARE_STATE_CHECK",
            Self::HistoricalTransfer => "LOCK_HISTORICAL_TRANSFER",
            Self::StaleCheckpoint => "LOCK_STALE_CHECKPOINT",
        }
    }
}

impl fmt::Display for MaintenanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lock_name())
    }
}

/// Result of one hardware-state check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Another replica holds the lease.
    Skipped,
    /// Still inside the grace window after a store outage.
    Deferred {
        /// Time left before hosts may be marked down again.
        remaining: Duration,
    },
    /// Sweep ran; this many hosts moved to `DOWN`.
    Swept(u64),
}

/// Liveness sweep run under the `LOCK_HARDWARE_STATE_CHECK` lease.
///
/// After the store was unreachable, hosts cannot have reported in either, so
/// the sweep is held back for `host_report_grace` before it may mark anything
/// down. The failure time is local to this replica.
pub struct HardwareStateCheck<S, C> {
    leases: LeaseManager<S, C>,
    monitor: LivenessMonitor<S, C>,
    clock: C,
    host_report_grace: Duration,
    store_failure_at_ms: Mutex<Option<u64>>,
}

impl<S, C> HardwareStateCheck<S, C>
where
    S: HostStore + LeaseStore,
    C: Clock,
{
    /// Create a check from its collaborators.
    pub fn new(
        leases: LeaseManager<S, C>,
        monitor: LivenessMonitor<S, C>,
        clock: C,
        host_report_grace: Duration,
    ) -> Self {
        Self {
            leases,
            monitor,
            clock,
            host_report_grace,
            store_failure_at_ms: Mutex::new(None),
        }
    }

    /// Epoch milliseconds of the last store outage seen, if still pending.
    pub fn store_failure_at_ms(&self) -> Option<u64> {
        *self.store_failure_at_ms.lock()
    }

    /// Run one check.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] if the lease or the sweep hit a store fault. An
    /// unavailable store starts the grace window.
    pub async fn run(&self) -> Result<CheckOutcome, CoordError> {
        let task = MaintenanceTask::HardwareStateCheck.lock_name();
        let mode = self.leases.mode_for(task);
        match self.leases.run_exclusive(task, mode, || self.check()).await {
            Ok(None) => {
                tracing::debug!("{} held by another scheduler", task);
                Ok(CheckOutcome::Skipped)
            }
            Ok(Some(outcome)) => outcome,
            Err(e) => {
                self.note_failure(&e);
                Err(e)
            }
        }
    }

    async fn check(&self) -> Result<CheckOutcome, CoordError> {
        let now = self.clock.now_ms();
        let grace = duration_ms(self.host_report_grace);
        let failed_at = *self.store_failure_at_ms.lock();
        if let Some(failed_at) = failed_at {
            let waited = now.saturating_sub(failed_at);
            if waited < grace {
                let remaining = Duration::from_millis(grace - waited);
                tracing::warn!(
                    "not running hardware state check, waiting {:?} for hosts to report in",
                    remaining
                );
                return Ok(CheckOutcome::Deferred { remaining });
            }
            *self.store_failure_at_ms.lock() = None;
        }

        match self.monitor.sweep().await {
            Ok(moved) => Ok(CheckOutcome::Swept(moved)),
            Err(e) => {
                self.note_failure(&e);
                Err(e)
            }
        }
    }

    fn note_failure(&self, e: &CoordError) {
        if e.store_error().is_some_and(StoreError::is_unavailable) {
            tracing::warn!("store unavailable during hardware state check: {}", e);
            *self.store_failure_at_ms.lock() = Some(self.clock.now_ms());
        }
    }
}
