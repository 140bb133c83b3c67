//! Log sink setup for binaries and tests.
//!
//! The library only emits `tracing` events. Call [`init`] once from `main` to
//! print them; `RUST_LOG` overrides `default_filter` when set.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber. Returns `false` if one was already set.
pub fn init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
