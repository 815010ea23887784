//! Core coordination primitives: ledger, leases and liveness.

pub mod audit;
pub mod error;
pub mod lease;
pub mod ledger;
pub mod liveness;
pub mod maintenance;
pub mod store;

pub use audit::{
    build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink, LeaseAction, TracingAuditSink,
};
pub use error::{AppResult, CoordError, ReservationAction, StoreError};
pub use lease::{AcquireMode, Lease, LeaseManager};
pub use ledger::ResourceLedger;
pub use liveness::LivenessMonitor;
pub use maintenance::{CheckOutcome, HardwareStateCheck, MaintenanceTask};
pub use store::{HostStore, LeaseStore};
