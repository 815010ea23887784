//! Unit tests for individual components

mod audit_test;
mod builders_test;
mod config_test;
#[cfg(feature = "tokio-runtime")]
mod runtime_test;
mod util_test;
