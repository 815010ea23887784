//! Periodic maintenance loop on a tokio runtime.
//!
//! Every replica may run the same loop; the leases inside each job decide
//! which replica actually does the work on a given tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::{CheckOutcome, HardwareStateCheck, HostStore, LeaseStore};
use crate::util::clock::Clock;

/// Handle to a running periodic job.
pub struct MaintenanceLoop {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl MaintenanceLoop {
    /// Spawn `job` on `handle`, running it once immediately and then every
    /// `period`. Ticks missed while a run is slow are skipped, not bunched.
    pub fn spawn<J, Fut>(handle: &Handle, period: Duration, job: J) -> Self
    where
        J: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut stop) = watch::channel(false);
        let join = handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => job().await,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("maintenance loop stopped");
        });
        Self { shutdown, join }
    }

    /// Whether the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the loop and wait for the current run to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            tracing::error!("maintenance loop panicked: {}", e);
        }
    }
}

/// Run the hardware-state check every `period`.
pub fn spawn_hardware_check<S, C>(
    handle: &Handle,
    check: Arc<HardwareStateCheck<S, C>>,
    period: Duration,
) -> MaintenanceLoop
where
    S: HostStore + LeaseStore,
    C: Clock,
{
    MaintenanceLoop::spawn(handle, period, move || {
        let check = Arc::clone(&check);
        async move {
            match check.run().await {
                Ok(CheckOutcome::Swept(moved)) if moved > 0 => {
                    tracing::info!("hardware state check marked {} host(s) down", moved);
                }
                Ok(outcome) => tracing::debug!("hardware state check: {:?}", outcome),
                Err(e) => tracing::warn!("hardware state check failed: {}", e),
            }
        }
    })
}
