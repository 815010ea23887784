//! Builds the ledger, lease manager and liveness monitor around one store.

use std::sync::Arc;

use crate::config::{CoordConfig, StoreBackendConfig};
use crate::core::{
    CoordError, HardwareStateCheck, HostStore, LeaseManager, LeaseStore, LivenessMonitor,
    MaintenanceTask, ResourceLedger,
};
use crate::util::clock::{Clock, SystemClock};

/// Coordination components sharing one store.
pub struct Coordinator<S, C = SystemClock> {
    /// Idle-core ledger.
    pub ledger: ResourceLedger<S>,
    /// Maintenance leases.
    pub leases: LeaseManager<S, C>,
    /// Host liveness sweeps.
    pub liveness: LivenessMonitor<S, C>,
    /// Lease-guarded liveness sweep for the maintenance loop.
    pub hardware_check: Arc<HardwareStateCheck<S, C>>,
    /// The shared store.
    pub store: Arc<S>,
}

impl<S, C> Coordinator<S, C>
where
    S: HostStore + LeaseStore,
    C: Clock + Clone,
{
    /// Upsert the configured leases plus every built-in maintenance lease.
    /// Returns how many records were written.
    ///
    /// # Errors
    ///
    /// [`CoordError::Store`] on the first store fault.
    pub async fn register_leases(&self) -> Result<usize, CoordError> {
        let mut registered = self.leases.register_tasks().await?;
        for task in MaintenanceTask::ALL {
            if !self.leases.config().tasks.contains_key(task.lock_name()) {
                self.leases.register_task(task.lock_name()).await?;
                registered += 1;
            }
        }
        Ok(registered)
    }
}

/// Build all components around an existing store after validating `cfg`.
///
/// # Errors
///
/// [`CoordError::Config`] if the configuration is invalid.
pub fn build_coordinator<S, C>(
    cfg: &CoordConfig,
    store: Arc<S>,
    clock: C,
) -> Result<Coordinator<S, C>, CoordError>
where
    S: HostStore + LeaseStore,
    C: Clock + Clone,
{
    cfg.validate().map_err(CoordError::Config)?;

    let ledger = ResourceLedger::new(Arc::clone(&store));
    let leases = LeaseManager::new(Arc::clone(&store), clock.clone(), cfg.leases.clone());
    let liveness = LivenessMonitor::new(
        Arc::clone(&store),
        clock.clone(),
        cfg.liveness.staleness_threshold(),
    );
    let hardware_check = Arc::new(HardwareStateCheck::new(
        leases.clone(),
        liveness.clone(),
        clock,
        cfg.liveness.host_report_grace(),
    ));

    Ok(Coordinator {
        ledger,
        leases,
        liveness,
        hardware_check,
        store,
    })
}

/// Build all components, creating the store from the backend section.
///
/// # Errors
///
/// [`CoordError::Config`] if the configuration is invalid, or whatever the
/// factory returns.
pub fn build_with<S, C, F>(
    cfg: &CoordConfig,
    store_factory: F,
    clock: C,
) -> Result<Coordinator<S, C>, CoordError>
where
    S: HostStore + LeaseStore,
    C: Clock + Clone,
    F: FnOnce(&StoreBackendConfig) -> Result<S, CoordError>,
{
    cfg.validate().map_err(CoordError::Config)?;
    let store = store_factory(&cfg.store)?;
    build_coordinator(cfg, Arc::new(store), clock)
}

/// Connect to the configured Postgres store, apply migrations, build all
/// components and register leases.
///
/// # Errors
///
/// [`CoordError::Config`] if the backend is not Postgres or the
/// configuration is invalid; [`CoordError::Store`] on connection or
/// migration faults.
#[cfg(feature = "postgres")]
pub async fn connect_postgres<C>(
    cfg: &CoordConfig,
    clock: C,
) -> Result<Coordinator<crate::infra::PostgresStore, C>, CoordError>
where
    C: Clock + Clone,
{
    cfg.validate().map_err(CoordError::Config)?;
    let StoreBackendConfig::Postgres {
        url,
        max_connections,
    } = &cfg.store
    else {
        return Err(CoordError::Config("store backend is not postgres".into()));
    };

    let store = crate::infra::PostgresStore::connect(url, *max_connections).await?;
    store.migrate().await?;
    let coordinator = build_coordinator(cfg, Arc::new(store), clock)?;
    let registered = coordinator.register_leases().await?;
    tracing::info!("postgres coordinator ready, {} lease(s) registered", registered);
    Ok(coordinator)
}
