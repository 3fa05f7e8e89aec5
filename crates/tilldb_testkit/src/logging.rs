//! Tracing setup for test runs.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initializes a tracing subscriber for tests.
///
/// Reads the `RUST_LOG` environment variable, defaulting to `warn`. Safe
/// to call from every test; the subscriber installs once per process.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}
