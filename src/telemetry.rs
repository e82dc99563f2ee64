//! Tracing setup for embedders and tests

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INIT_ONCE: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber once
///
/// Filter via `RUST_LOG` (default `info`). Safe to call from multiple
/// tests or embedders; later calls are no-ops.
pub fn init_telemetry() {
    INIT_ONCE.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
