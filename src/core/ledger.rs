//! Idle-core ledger for worker hosts.

use std::sync::Arc;

use crate::core::{CoordError, HostStore, ReservationAction};

/// Books and returns cores on hosts through single atomic counter updates.
///
/// The ledger performs no floor check: a dispatcher must confirm
/// `idle_cores >= n` (see [`ResourceLedger::idle_cores`]) before calling
/// [`ResourceLedger::allocate`].
pub struct ResourceLedger<S> {
    store: Arc<S>,
}

impl<S> Clone for ResourceLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: HostStore> ResourceLedger<S> {
    /// Create a ledger over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// `idle_cores -= cores`. `Ok(false)` if the host does not exist.
    ///
    /// # Errors
    ///
    /// [`CoordError::ResourceReservationFailure`] if the store could not
    /// execute the update.
    pub async fn allocate(&self, host_id: &str, cores: u32) -> Result<bool, CoordError> {
        self.apply(host_id, cores, ReservationAction::Allocate).await
    }

    /// `idle_cores += cores`. `Ok(false)` if the host does not exist.
    ///
    /// # Errors
    ///
    /// [`CoordError::ResourceReservationFailure`] if the store could not
    /// execute the update.
    pub async fn deallocate(&self, host_id: &str, cores: u32) -> Result<bool, CoordError> {
        self.apply(host_id, cores, ReservationAction::Deallocate).await
    }

    /// Current idle cores of a host, `None` if absent.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on a store fault.
    pub async fn idle_cores(&self, host_id: &str) -> Result<Option<i64>, CoordError> {
        Ok(self.store.get_host(host_id).await?.map(|h| h.idle_cores))
    }

    async fn apply(
        &self,
        host_id: &str,
        cores: u32,
        action: ReservationAction,
    ) -> Result<bool, CoordError> {
        let delta = match action {
            ReservationAction::Allocate => -i64::from(cores),
            ReservationAction::Deallocate => i64::from(cores),
        };
        let rows = self
            .store
            .adjust_idle_cores(host_id, delta)
            .await
            .map_err(|source| {
                tracing::warn!("failed to {} {} cores on host {}: {}", action, cores, host_id, source);
                CoordError::ResourceReservationFailure {
                    host_id: host_id.to_string(),
                    cores,
                    action,
                    source,
                }
            })?;
        tracing::debug!("{} {} cores on host {}: {} row(s)", action, cores, host_id, rows);
        Ok(rows == 1)
    }
}
