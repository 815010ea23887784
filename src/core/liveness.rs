//! Marks hosts that stopped reporting as down.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{CoordError, HostStore};
use crate::util::clock::{duration_ms, Clock, SystemClock};

/// Set-based staleness sweep over host records.
pub struct LivenessMonitor<S, C = SystemClock> {
    store: Arc<S>,
    clock: C,
    staleness_threshold: Duration,
}

impl<S, C: Clone> Clone for LivenessMonitor<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            staleness_threshold: self.staleness_threshold,
        }
    }
}

impl<S: HostStore, C: Clock> LivenessMonitor<S, C> {
    /// Create a monitor with the configured staleness threshold.
    pub fn new(store: Arc<S>, clock: C, staleness_threshold: Duration) -> Self {
        Self {
            store,
            clock,
            staleness_threshold,
        }
    }

    /// Configured staleness threshold.
    pub const fn staleness_threshold(&self) -> Duration {
        self.staleness_threshold
    }

    /// Move every `UP` host whose last ping is older than
    /// `staleness_threshold` to `DOWN`. Returns how many hosts moved.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn sweep_stale_hosts(&self, staleness_threshold: Duration) -> Result<u64, CoordError> {
        let cutoff = self
            .clock
            .now_ms()
            .saturating_sub(duration_ms(staleness_threshold));
        let moved = self.store.mark_stale_hosts_down(cutoff).await?;
        if moved > 0 {
            tracing::info!(
                "marked {} host(s) down, no ping for over {:?}",
                moved,
                staleness_threshold
            );
        } else {
            tracing::debug!("no stale hosts (threshold {:?})", staleness_threshold);
        }
        Ok(moved)
    }

    /// [`LivenessMonitor::sweep_stale_hosts`] with the configured threshold.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn sweep(&self) -> Result<u64, CoordError> {
        self.sweep_stale_hosts(self.staleness_threshold).await
    }
}
