//! Tracing setup for binaries and tests that embed the accumulator.
//!
//! The library itself only emits through [`tracing`] macros; installing a
//! subscriber is the embedder's call. This helper wires the conventional
//! one: an fmt layer filtered by `RUST_LOG`.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatting subscriber honoring `RUST_LOG`, defaulting to
/// `warn` globally and `info` for this crate. Safe to call more than
/// once; only the first call installs anything.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,streamloom=info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
