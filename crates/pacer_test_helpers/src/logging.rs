//! Test logging configuration
//!
//! Logs go through the test writer so they only show up for failing tests
//! (or with `--nocapture`).

use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Filter that shows queue and dispatch decisions without HTTP client noise
pub const SYNC_DEBUG_FILTER: &str = "pacer_sync=debug,pacer_common=debug,hyper=warn,reqwest=warn";

/// Install a test subscriber with `filter` unless `RUST_LOG` is set
///
/// Only the first call per test binary has an effect.
///
/// ```rust
/// use pacer_test_helpers::logging::init_test_logging;
///
/// init_test_logging("pacer_sync=trace");
/// tracing::debug!("visible with --nocapture");
/// ```
pub fn init_test_logging(filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer().with_target(true))
            .with(filter)
            .try_init();
    });
}

/// Debug-level logs for the sync crates
pub fn init_sync_test_logging() {
    init_test_logging(SYNC_DEBUG_FILTER);
}
