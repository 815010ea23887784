//! # Render Coord
//!
//! Coordination primitives for a render-farm scheduler running as several
//! replicas against one shared database.
//!
//! - **Resource ledger**: books and returns cores on worker hosts with single
//!   atomic counter updates (`idle_cores ± n`).
//! - **Maintenance leases**: named, timeout-bounded leases so periodic work
//!   runs on at most one replica at a time. Acquisition is one conditional
//!   update; a caller holds the lease only if exactly one record changed.
//! - **Liveness sweeps**: hosts whose last ping is older than a threshold are
//!   moved from `UP` to `DOWN` in one set-based update.
//!
//! The store is the only shared state. Replicas never talk to each other.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use render_coord::builders::build_coordinator;
//! use render_coord::config::CoordConfig;
//! use render_coord::infra::InMemoryStore;
//! use render_coord::util::SystemClock;
//!
//! let store = Arc::new(InMemoryStore::new());
//! store.register_host("render-01", 16, render_coord::util::now_ms());
//! let coord = build_coordinator(&CoordConfig::default(), store, SystemClock)?;
//! coord.register_leases().await?;
//!
//! if coord.ledger.allocate("render-01", 4).await? {
//!     // dispatch the frame
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Ledger, leases, liveness and the store ports they run on.
pub mod core;
/// Configuration models for leases, liveness and the store backend.
pub mod config;
/// Builders wiring the components around one store.
pub mod builders;
/// Store backends.
pub mod infra;
/// Periodic maintenance driver on tokio.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities: clock, records, telemetry.
pub mod util;
