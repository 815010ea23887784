//! Named, timeout-bounded maintenance leases stored centrally.
//!
//! Each acquisition is one conditional update against the shared store; no
//! replica keeps authoritative lease state in memory. A caller holds a lease
//! only if its own acquisition reported exactly one updated record.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;

use crate::config::LeaseConfig;
use crate::core::audit::{build_audit_event, AuditSink, LeaseAction};
use crate::core::{CoordError, LeaseStore};
use crate::util::clock::{duration_ms, Clock, SystemClock};
use crate::util::serde::{TaskLease, FREE_TOKEN};

/// Acquisition predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Free, or held for longer than the task's configured timeout.
    Expiring,
    /// Free, and the last successful run is older than the given spacing.
    /// A stuck holder is never taken over.
    Spaced(Duration),
}

/// Proof of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    task_name: String,
    token: u64,
    mode: AcquireMode,
}

impl Lease {
    /// Task name.
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Token stamped into the store (epoch milliseconds).
    pub const fn token(&self) -> u64 {
        self.token
    }

    /// Predicate the lease was acquired with.
    pub const fn mode(&self) -> AcquireMode {
        self.mode
    }
}

/// Acquires and releases task leases.
pub struct LeaseManager<S, C = SystemClock> {
    store: Arc<S>,
    clock: C,
    config: LeaseConfig,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl<S, C: Clone> Clone for LeaseManager<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            config: self.config.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<S: LeaseStore, C: Clock> LeaseManager<S, C> {
    /// Create a manager over a shared store.
    pub fn new(store: Arc<S>, clock: C, config: LeaseConfig) -> Self {
        Self {
            store,
            clock,
            config,
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Lease configuration in use.
    pub const fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Default acquisition mode for a task: spaced if a minimum interval is
    /// configured, expiring otherwise.
    pub fn mode_for(&self, task_name: &str) -> AcquireMode {
        self.config
            .min_interval_for(task_name)
            .map_or(AcquireMode::Expiring, AcquireMode::Spaced)
    }

    /// Upsert one task lease record with its configured timeout.
    ///
    /// The stored timeout is informational only. Expiring acquisition always
    /// uses this manager's [`LeaseConfig::timeout_for`], so replicas must
    /// share the same lease configuration.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn register_task(&self, task_name: &str) -> Result<(), CoordError> {
        let timeout = self.config.timeout_for(task_name);
        self.store
            .register_task(task_name, duration_ms(timeout))
            .await?;
        tracing::debug!("registered lease {} (timeout {:?})", task_name, timeout);
        Ok(())
    }

    /// Upsert every configured task. Returns how many were registered.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on the first store fault.
    pub async fn register_tasks(&self) -> Result<usize, CoordError> {
        let mut names: Vec<&String> = self.config.tasks.keys().collect();
        names.sort();
        for name in &names {
            self.register_task(name).await?;
        }
        Ok(names.len())
    }

    /// Acquire if free or if the current holder has exceeded the timeout.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn try_acquire(&self, task_name: &str) -> Result<bool, CoordError> {
        Ok(self
            .acquire(task_name, AcquireMode::Expiring)
            .await?
            .is_some())
    }

    /// Acquire if free and the last run is older than `min_interval`.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn try_acquire_with_interval(
        &self,
        task_name: &str,
        min_interval: Duration,
    ) -> Result<bool, CoordError> {
        Ok(self
            .acquire(task_name, AcquireMode::Spaced(min_interval))
            .await?
            .is_some())
    }

    /// Attempt an acquisition and return the lease on success.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn acquire(
        &self,
        task_name: &str,
        mode: AcquireMode,
    ) -> Result<Option<Lease>, CoordError> {
        // A zero token would read back as "free".
        let now = self.clock.now_ms().max(1);
        let rows = match mode {
            AcquireMode::Expiring => {
                let timeout = duration_ms(self.config.timeout_for(task_name));
                self.store.acquire_expiring(task_name, now, timeout).await?
            }
            AcquireMode::Spaced(min_interval) => {
                self.store
                    .acquire_spaced(task_name, now, duration_ms(min_interval))
                    .await?
            }
        };

        if rows == 1 {
            tracing::info!("acquired lease {} with token {}", task_name, now);
            self.record(task_name, LeaseAction::Acquire, now, None);
            Ok(Some(Lease {
                task_name: task_name.to_string(),
                token: now,
                mode,
            }))
        } else {
            tracing::debug!("lease {} not available", task_name);
            self.record(task_name, LeaseAction::Skip, FREE_TOKEN, None);
            Ok(None)
        }
    }

    /// Clear the lease no matter who holds it. Releasing a free lease is a
    /// no-op.
    ///
    /// A holder that was taken over after its timeout will clear the newer
    /// holder's token with this call; use [`LeaseManager::release_lease`]
    /// when the acquisition's [`Lease`] is at hand.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn release(&self, task_name: &str) -> Result<(), CoordError> {
        let rows = self.store.clear_lock(task_name).await?;
        tracing::debug!("released lease {} ({} row(s))", task_name, rows);
        self.record(task_name, LeaseAction::Release, FREE_TOKEN, None);
        Ok(())
    }

    /// Clear the lease only if it still carries this lease's token.
    /// Returns `false` if another caller has taken it over meanwhile.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn release_lease(&self, lease: &Lease) -> Result<bool, CoordError> {
        let rows = self
            .store
            .clear_lock_if_token(&lease.task_name, lease.token)
            .await?;
        if rows == 1 {
            tracing::debug!("released lease {} token {}", lease.task_name, lease.token);
            self.record(&lease.task_name, LeaseAction::Release, lease.token, None);
            Ok(true)
        } else {
            tracing::warn!(
                "lease {} token {} was taken over before release",
                lease.task_name,
                lease.token
            );
            self.record(
                &lease.task_name,
                LeaseAction::ReleaseLost,
                lease.token,
                Some("token superseded".into()),
            );
            Ok(false)
        }
    }

    /// Run `work` while holding the lease. Returns `Ok(None)` without running
    /// anything if the lease was not available.
    ///
    /// The lease is released with [`LeaseManager::release_lease`] after
    /// `work` resolves, whatever its output. If `work` panics the lease is
    /// released first and the panic is then resumed. If the returned future
    /// is dropped before it completes, the release is spawned on the current
    /// tokio runtime; without the `tokio-runtime` feature (or outside a
    /// runtime) the lease stays held until an expiring acquisition takes it
    /// over.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] if acquisition or release hit a store fault.
    pub async fn run_exclusive<F, Fut, T>(
        &self,
        task_name: &str,
        mode: AcquireMode,
        work: F,
    ) -> Result<Option<T>, CoordError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(lease) = self.acquire(task_name, mode).await? else {
            return Ok(None);
        };
        let mut guard = ReleaseOnDrop::new(Arc::clone(&self.store), &lease);

        let outcome = AssertUnwindSafe(async { work().await })
            .catch_unwind()
            .await;
        let released = self.release_lease(&lease).await;
        guard.disarm();

        match outcome {
            Ok(output) => {
                if let Err(e) = released {
                    tracing::error!("failed to release lease {} after run: {}", task_name, e);
                    return Err(e);
                }
                Ok(Some(output))
            }
            Err(panic) => {
                if let Err(e) = released {
                    tracing::error!("failed to release lease {} after panic: {}", task_name, e);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Point read of a lease record.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn lease(&self, task_name: &str) -> Result<Option<TaskLease>, CoordError> {
        Ok(self.store.get_lease(task_name).await?)
    }

    fn record(&self, task_name: &str, action: LeaseAction, token: u64, detail: Option<String>) {
        if let Some(audit_sink) = &self.audit {
            let mut sink = audit_sink.lock();
            sink.record(build_audit_event(task_name, action, token, detail));
        }
    }
}

/// Clears a lease by token if a [`LeaseManager::run_exclusive`] future is
/// dropped while the work is still running.
struct ReleaseOnDrop<S: LeaseStore> {
    store: Arc<S>,
    task_name: String,
    token: u64,
    armed: bool,
}

impl<S: LeaseStore> ReleaseOnDrop<S> {
    fn new(store: Arc<S>, lease: &Lease) -> Self {
        Self {
            store,
            task_name: lease.task_name.clone(),
            token: lease.token,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<S: LeaseStore> ReleaseOnDrop<S> {
    #[cfg(feature = "tokio-runtime")]
    fn release_in_background(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.warn_left_held();
            return;
        };
        let store = Arc::clone(&self.store);
        let task_name = std::mem::take(&mut self.task_name);
        let token = self.token;
        tracing::warn!("lease {} dropped mid-run, releasing token {}", task_name, token);
        handle.spawn(async move {
            if let Err(e) = store.clear_lock_if_token(&task_name, token).await {
                tracing::error!("failed to release abandoned lease {}: {}", task_name, e);
            }
        });
    }

    #[cfg(not(feature = "tokio-runtime"))]
    fn release_in_background(&mut self) {
        self.warn_left_held();
    }

    fn warn_left_held(&self) {
        tracing::warn!(
            "lease {} dropped mid-run with no runtime to release it, token {} stays held",
            self.task_name,
            self.token
        );
    }
}

impl<S: LeaseStore> Drop for ReleaseOnDrop<S> {
    fn drop(&mut self) {
        if self.armed {
            self.release_in_background();
        }
    }
}
