//! Tracing setup for binaries and tests embedding this crate.
//!
//! The library itself never installs a global subscriber — only emits
//! `tracing` spans/events — so that embedding applications keep control
//! of their own logging configuration. This module is a convenience for
//! tests and standalone binaries that want a sane default.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber driven by `RUST_LOG`, defaulting to `warn`.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
