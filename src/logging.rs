//! Structured logging setup.
//!
//! The source formats colored request lines by hand
//! (`psygo/log.go`'s `LoggerFormatter`); that formatter is out of scope
//! here. What it's *for*, per-request structured logging, is not, so this
//! module wires up `tracing` the way the rest of the ecosystem does and the
//! router's [`crate::router::middleware::logger`] middleware emits spans
//! through it.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info` when unset. Safe to call once at process startup; a second call
/// is a no-op (errors from `try_init` are swallowed since tests may install
/// their own subscriber first).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
