//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing for schedulers embedding this crate. Callers can install
/// their own subscriber; this helper installs a default env-based subscriber
/// (`RUST_LOG`) only if none is set yet.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
    tracing::debug!("render_coord tracing initialised");
}
