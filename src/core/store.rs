//! Persistent store ports.
//!
//! Every method is a single atomic operation against the store: a predicate
//! over the current row plus a write, applied only if the predicate holds.
//! Methods return the number of affected rows so callers can tell "nothing
//! matched" apart from a [`StoreError`].

use async_trait::async_trait;

use crate::core::StoreError;
use crate::util::serde::{HostRecord, TaskLease};

/// Host resource records.
#[async_trait]
pub trait HostStore: Send + Sync + 'static {
    /// `idle_cores += delta` for one host, unconditionally.
    async fn adjust_idle_cores(&self, host_id: &str, delta: i64) -> Result<u64, StoreError>;

    /// Point read of one host.
    async fn get_host(&self, host_id: &str) -> Result<Option<HostRecord>, StoreError>;

    /// Move every `UP` host whose last ping is strictly before `cutoff_ms`
    /// to `DOWN`, in one bulk update.
    async fn mark_stale_hosts_down(&self, cutoff_ms: u64) -> Result<u64, StoreError>;
}

/// Task lease records.
#[async_trait]
pub trait LeaseStore: Send + Sync + 'static {
    /// Insert a free lease, or update the timeout of an existing one. The
    /// stored timeout is never read by the acquire calls, which take it as
    /// a parameter.
    async fn register_task(&self, task_name: &str, timeout_ms: u64) -> Result<(), StoreError>;

    /// Set `lock_token = last_run = now_ms` where the lease is free or
    /// `now_ms - lock_token > timeout_ms`.
    async fn acquire_expiring(
        &self,
        task_name: &str,
        now_ms: u64,
        timeout_ms: u64,
    ) -> Result<u64, StoreError>;

    /// Set `lock_token = last_run = now_ms` where the lease is free and
    /// `now_ms - last_run > min_interval_ms`.
    async fn acquire_spaced(
        &self,
        task_name: &str,
        now_ms: u64,
        min_interval_ms: u64,
    ) -> Result<u64, StoreError>;

    /// Set `lock_token = 0` regardless of holder.
    async fn clear_lock(&self, task_name: &str) -> Result<u64, StoreError>;

    /// Set `lock_token = 0` only where it still equals `token`.
    async fn clear_lock_if_token(&self, task_name: &str, token: u64) -> Result<u64, StoreError>;

    /// Point read of one lease.
    async fn get_lease(&self, task_name: &str) -> Result<Option<TaskLease>, StoreError>;
}
