//! In-memory store for a single process, tests and development.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{HostStore, LeaseStore, StoreError};
use crate::util::serde::{HostId, HostRecord, HostState, TaskLease, FREE_TOKEN};

/// Store keeping hosts and leases in mutex-guarded maps.
///
/// Every port call takes the relevant lock exactly once, so each conditional
/// update is atomic with respect to other callers sharing the store.
#[derive(Default)]
pub struct InMemoryStore {
    hosts: Mutex<HashMap<HostId, HostRecord>>,
    leases: Mutex<HashMap<String, TaskLease>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a host as `UP`.
    pub fn register_host(&self, host_id: impl Into<HostId>, idle_cores: i64, last_ping_ms: u64) {
        let host_id = host_id.into();
        self.hosts.lock().insert(
            host_id.clone(),
            HostRecord {
                host_id,
                idle_cores,
                state: HostState::Up,
                last_ping_ms,
            },
        );
    }

    /// Heartbeat: stamp the ping time and bring the host back `UP`.
    /// Returns `false` if the host is unknown.
    pub fn record_ping(&self, host_id: &str, now_ms: u64) -> bool {
        self.hosts.lock().get_mut(host_id).is_some_and(|host| {
            host.last_ping_ms = now_ms;
            host.state = HostState::Up;
            true
        })
    }

    /// Set a host's hardware state directly.
    pub fn set_host_state(&self, host_id: &str, state: HostState) -> bool {
        self.hosts.lock().get_mut(host_id).is_some_and(|host| {
            host.state = state;
            true
        })
    }

    /// Decommission a host.
    pub fn remove_host(&self, host_id: &str) -> bool {
        self.hosts.lock().remove(host_id).is_some()
    }

    /// Snapshot of one host.
    pub fn host(&self, host_id: &str) -> Option<HostRecord> {
        self.hosts.lock().get(host_id).cloned()
    }

    /// Snapshot of one task lease.
    pub fn lease(&self, task_name: &str) -> Option<TaskLease> {
        self.leases.lock().get(task_name).cloned()
    }

    /// Number of registered hosts.
    pub fn host_count(&self) -> usize {
        self.hosts.lock().len()
    }
}

#[async_trait]
impl HostStore for InMemoryStore {
    async fn adjust_idle_cores(&self, host_id: &str, delta: i64) -> Result<u64, StoreError> {
        let mut hosts = self.hosts.lock();
        let Some(host) = hosts.get_mut(host_id) else {
            return Ok(0);
        };
        host.idle_cores = host
            .idle_cores
            .checked_add(delta)
            .ok_or_else(|| StoreError::Integrity(format!("idle_cores overflow on {host_id}")))?;
        Ok(1)
    }

    async fn get_host(&self, host_id: &str) -> Result<Option<HostRecord>, StoreError> {
        Ok(self.host(host_id))
    }

    async fn mark_stale_hosts_down(&self, cutoff_ms: u64) -> Result<u64, StoreError> {
        let mut moved = 0;
        for host in self.hosts.lock().values_mut() {
            if host.state == HostState::Up && host.last_ping_ms < cutoff_ms {
                host.state = HostState::Down;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[async_trait]
impl LeaseStore for InMemoryStore {
    async fn register_task(&self, task_name: &str, timeout_ms: u64) -> Result<(), StoreError> {
        self.leases
            .lock()
            .entry(task_name.to_string())
            .and_modify(|lease| lease.timeout_ms = timeout_ms)
            .or_insert_with(|| TaskLease::new(task_name, timeout_ms));
        Ok(())
    }

    async fn acquire_expiring(
        &self,
        task_name: &str,
        now_ms: u64,
        timeout_ms: u64,
    ) -> Result<u64, StoreError> {
        let mut leases = self.leases.lock();
        let Some(lease) = leases.get_mut(task_name) else {
            return Ok(0);
        };
        if lease.lock_token == FREE_TOKEN || now_ms.saturating_sub(lease.lock_token) > timeout_ms {
            lease.lock_token = now_ms;
            lease.last_run_ms = now_ms;
            return Ok(1);
        }
        Ok(0)
    }

    async fn acquire_spaced(
        &self,
        task_name: &str,
        now_ms: u64,
        min_interval_ms: u64,
    ) -> Result<u64, StoreError> {
        let mut leases = self.leases.lock();
        let Some(lease) = leases.get_mut(task_name) else {
            return Ok(0);
        };
        if lease.lock_token == FREE_TOKEN
            && now_ms.saturating_sub(lease.last_run_ms) > min_interval_ms
        {
            lease.lock_token = now_ms;
            lease.last_run_ms = now_ms;
            return Ok(1);
        }
        Ok(0)
    }

    async fn clear_lock(&self, task_name: &str) -> Result<u64, StoreError> {
        Ok(self
            .leases
            .lock()
            .get_mut(task_name)
            .map_or(0, |lease| {
                lease.lock_token = FREE_TOKEN;
                1
            }))
    }

    async fn clear_lock_if_token(&self, task_name: &str, token: u64) -> Result<u64, StoreError> {
        let mut leases = self.leases.lock();
        match leases.get_mut(task_name) {
            Some(lease) if lease.lock_token == token && token != FREE_TOKEN => {
                lease.lock_token = FREE_TOKEN;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn get_lease(&self, task_name: &str) -> Result<Option<TaskLease>, StoreError> {
        Ok(self.lease(task_name))
    }
}
