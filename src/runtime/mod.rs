//! Tokio driver for periodic maintenance work.

pub mod maintenance_loop;

pub use maintenance_loop::{spawn_hardware_check, MaintenanceLoop};
