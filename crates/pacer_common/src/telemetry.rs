//! Telemetry and logging initialization
//!
//! Structured logging with `tracing` and `tracing-subscriber`.
//! stdout carries command output (JSON reports, queue listings), so every log
//! line goes to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber
///
/// # Arguments
/// * `verbose` - If true, sets log level to DEBUG, otherwise INFO
/// * `json_format` - If true, outputs logs in JSON format for machine parsing
///
/// `RUST_LOG` takes precedence over both defaults.
///
/// # Example
/// ```
/// pacer_common::telemetry::init_tracing(false, false);
/// tracing::info!("Sync client started");
/// ```
pub fn init_tracing(verbose: bool, json_format: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // try_init: a second call (tests, embedded use) keeps the first subscriber
    if json_format {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .with(env_filter)
            .try_init();
    }
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug,hyper=info,reqwest=info,tokio=info"
    } else {
        "info"
    }
}
