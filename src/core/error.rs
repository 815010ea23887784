//! Error types for ledger, lease and liveness operations.
//!
//! A conditional update that matches zero rows is never an error; it comes
//! back as `Ok(false)` / `Ok(0)`. Everything here means the store could not
//! execute the operation at all.

use std::fmt;

use thiserror::Error;

/// Faults raised by a persistent store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connectivity loss: pool exhausted, socket or TLS failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Constraint violation.
    #[error("integrity violation: {0}")]
    Integrity(String),
    /// Any other backend failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the store could not be reached at all.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Direction of a core-count change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationAction {
    /// Booking cores on a host.
    Allocate,
    /// Returning cores to a host.
    Deallocate,
}

impl fmt::Display for ReservationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocate => f.write_str("allocate"),
            Self::Deallocate => f.write_str("de-allocate"),
        }
    }
}

/// Errors produced by the coordination components.
#[derive(Debug, Error)]
pub enum CoordError {
    /// A core allocation or deallocation could not be executed.
    #[error("failed to {action} {cores} cores on host {host_id}: {source}")]
    ResourceReservationFailure {
        /// Host the change was aimed at.
        host_id: String,
        /// Number of cores in the request.
        cores: u32,
        /// Allocate or deallocate.
        action: ReservationAction,
        /// Underlying store fault.
        #[source]
        source: StoreError,
    },
    /// Store fault from a lease, sweep or lookup, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoordError {
    /// The store fault behind this error, if any.
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::ResourceReservationFailure { source, .. } | Self::Store(source) => Some(source),
            Self::Config(_) => None,
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
