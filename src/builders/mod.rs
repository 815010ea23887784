//! Builders assembling the coordination components from configuration.

pub mod coord_builder;

#[cfg(feature = "postgres")]
pub use coord_builder::connect_postgres;
pub use coord_builder::{build_coordinator, build_with, Coordinator};
