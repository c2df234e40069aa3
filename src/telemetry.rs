//! Structured logging init, following the `tracing_subscriber::fmt` +
//! env-filter pattern used across the pack's validator/service binaries
//! (e.g. `setu-validator`'s `main.rs`) rather than a bespoke logger.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` fmt subscriber honoring `RUST_LOG`, defaulting to
/// `info` when unset. Safe to call once per process; a second call is a
/// no-op (the global default subscriber can only be set once).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
