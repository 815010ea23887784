//! Configuration models for leases, liveness and the store backend.

pub mod coord;

pub use coord::{CoordConfig, LeaseConfig, LivenessConfig, StoreBackendConfig, TaskLeaseConfig};
